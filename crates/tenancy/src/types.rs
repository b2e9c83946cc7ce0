//! Core tenant data shapes: in-memory instances, the upstream wire record,
//! and the on-disk per-user config.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Account status as reported by the cloud backend. Only `active` tenants
/// may authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
    Expired,
}

impl TenantStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// The authoritative in-memory record for a loaded tenant.
///
/// Owned exclusively by the manager; everything handed past the lock
/// boundary is a copy.
#[derive(Debug, Clone)]
pub struct TenantInstance {
    pub user_id: String,
    pub status: TenantStatus,
    /// Resolved configuration, opaque to the core. The agent runtime owns
    /// its schema.
    pub config: serde_json::Value,
    pub llm_api_key: Option<String>,
    pub workspace_path: PathBuf,
    pub config_path: PathBuf,
    /// Epoch millis of the last cache hit, pending-counter change, or
    /// successful authentication.
    pub last_activity_ms: u64,
    /// In-flight request count. An instance with pending work is never
    /// evicted.
    pub pending_requests: u32,
}

/// A tenant record as the cloud backend ships it (snake_case on the wire).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudTenantRecord {
    pub user_id: String,
    pub gateway_token: String,
    pub openclaw_config: serde_json::Value,
    pub status: TenantStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_api_key: Option<String>,
    pub updated_at: String,
}

/// Result of a successful remote token verification.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub user_id: String,
    pub status: TenantStatus,
    pub config: serde_json::Value,
}

/// The per-user `config.json` persisted under `{configRoot}/users/{id}/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTenantConfig {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_token: Option<String>,
    pub status: TenantStatus,
    pub config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_lowercase() {
        for (status, wire) in [
            (TenantStatus::Active, "\"active\""),
            (TenantStatus::Suspended, "\"suspended\""),
            (TenantStatus::Expired, "\"expired\""),
        ] {
            assert_eq!(serde_json::to_string(&status).unwrap(), wire);
            let parsed: TenantStatus = serde_json::from_str(wire).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn cloud_record_parses_wire_shape() {
        let raw = r#"{
            "user_id": "u-1",
            "gateway_token": "gt_abc",
            "openclaw_config": { "m": 1 },
            "status": "active",
            "llm_api_key": "sk-xyz",
            "updated_at": "2026-01-01T00:00:00Z"
        }"#;
        let record: CloudTenantRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.user_id, "u-1");
        assert_eq!(record.status, TenantStatus::Active);
        assert_eq!(record.llm_api_key.as_deref(), Some("sk-xyz"));
        assert_eq!(record.openclaw_config["m"], 1);
    }

    #[test]
    fn cloud_record_key_is_optional() {
        let raw = r#"{
            "user_id": "u-2",
            "gateway_token": "gt_def",
            "openclaw_config": {},
            "status": "suspended",
            "updated_at": "2026-01-01T00:00:00Z"
        }"#;
        let record: CloudTenantRecord = serde_json::from_str(raw).unwrap();
        assert!(record.llm_api_key.is_none());
        assert!(!record.status.is_active());
    }
}
