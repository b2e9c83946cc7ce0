//! On-disk persistence of per-user tenant configs (`config.json`, mode 0600).

use std::{io::ErrorKind, path::Path};

use crate::{
    error::Result,
    fsutil::write_restricted,
    types::StoredTenantConfig,
};

/// Persist a tenant's config record, creating parents with owner-only modes.
pub fn write_user_config(path: &Path, stored: &StoredTenantConfig) -> Result<()> {
    write_restricted(path, &serde_json::to_string_pretty(stored)?)
}

/// Load a tenant's config record. `Ok(None)` when no config exists on disk.
pub fn read_user_config(path: &Path) -> Result<Option<StoredTenantConfig>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::TenantStatus;

    #[test]
    fn round_trips_arbitrary_config_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("users").join("u-1").join("config.json");

        for config in [
            serde_json::json!({}),
            serde_json::json!({"m": 1}),
            serde_json::json!({"nested": {"list": [1, "two", null], "flag": true}}),
            serde_json::json!("just a string"),
        ] {
            let stored = StoredTenantConfig {
                user_id: "u-1".into(),
                gateway_token: Some("gt_abc".into()),
                status: TenantStatus::Active,
                config: config.clone(),
                llm_api_key: Some("sk-1".into()),
                updated_at: Some("2026-01-01T00:00:00Z".into()),
            };
            write_user_config(&path, &stored).unwrap();
            let loaded = read_user_config(&path).unwrap().unwrap();
            assert_eq!(loaded, stored);
            assert_eq!(loaded.config, config);
        }
    }

    #[test]
    fn missing_config_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(
            read_user_config(&tmp.path().join("nope.json"))
                .unwrap()
                .is_none()
        );
    }
}
