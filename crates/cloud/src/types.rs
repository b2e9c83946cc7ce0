//! Wire shapes for the cloud backend's gateway endpoints.
//!
//! The response envelopes use camelCase keys; individual tenant records are
//! snake_case (see [`clawden_tenancy::CloudTenantRecord`]).

use serde::{Deserialize, Serialize};

use clawden_tenancy::{CloudTenantRecord, TenantStatus};

/// One page of `GET /gateway/configs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPage {
    pub users: Vec<CloudTenantRecord>,
    #[serde(rename = "syncTimestamp")]
    pub sync_timestamp: String,
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Body of a successful `POST /auth/verify-token`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub data: VerifyData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyData {
    pub user_id: String,
    pub status: TenantStatus,
    pub openclaw_config: serde_json::Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_page_envelope() {
        let raw = r#"{
            "users": [{
                "user_id": "u-1",
                "gateway_token": "gt_1",
                "openclaw_config": {"m": 1},
                "status": "active",
                "updated_at": "2026-01-01T00:00:00Z"
            }],
            "syncTimestamp": "2026-01-01T00:00:05Z",
            "hasMore": true,
            "nextCursor": "page-2"
        }"#;
        let page: ConfigPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.users.len(), 1);
        assert_eq!(page.sync_timestamp, "2026-01-01T00:00:05Z");
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("page-2"));
    }

    #[test]
    fn missing_pagination_fields_default() {
        let raw = r#"{ "users": [], "syncTimestamp": "2026-01-01T00:00:05Z" }"#;
        let page: ConfigPage = serde_json::from_str(raw).unwrap();
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn parses_verify_envelope() {
        let raw = r#"{
            "data": {
                "user_id": "u-1",
                "status": "active",
                "openclaw_config": {"m": 1}
            }
        }"#;
        let response: VerifyResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.data.user_id, "u-1");
        assert_eq!(response.data.status, TenantStatus::Active);
    }
}
