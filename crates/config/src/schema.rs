//! Typed views over the global OpenClaw config file.
//!
//! Only the sections the multi-tenant core reads are modeled; everything else
//! in the file is ignored. Uses `#[serde(default)]` liberally so older and
//! newer OpenClaw config versions both parse.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Env var consulted when `serviceToken` is not set in the config file.
pub const SERVICE_TOKEN_ENV: &str = "OPENCLAW_SERVICE_TOKEN";

/// Root of the global config (`openclaw.json` / `/etc/openclaw/config.json`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    #[serde(rename = "multiTenant")]
    pub multi_tenant: Option<MultiTenantConfig>,
}

impl GlobalConfig {
    /// Whether the multi-tenant block is present and switched on.
    pub fn multi_tenant_enabled(&self) -> bool {
        self.multi_tenant.as_ref().is_some_and(|mt| mt.enabled)
    }
}

/// The `multiTenant` block. Keys are camelCase on disk, matching the
/// OpenClaw config convention.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MultiTenantConfig {
    /// Off by default; the core is inert unless explicitly enabled.
    pub enabled: bool,
    pub cloud_backend_url: Option<String>,
    pub service_token: Option<String>,
    pub config_root: Option<String>,
    pub workspace_root: Option<String>,
    pub template_path: Option<String>,
    pub max_cached_users: usize,
    pub user_idle_timeout_ms: u64,
    pub sync_interval_ms: u64,
}

impl Default for MultiTenantConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cloud_backend_url: None,
            service_token: None,
            config_root: None,
            workspace_root: None,
            template_path: None,
            max_cached_users: 100,
            user_idle_timeout_ms: 60 * 60 * 1000,
            sync_interval_ms: 5 * 60 * 1000,
        }
    }
}

/// A fully validated multi-tenant configuration, ready to hand to the
/// manager and synchronizer.
#[derive(Debug, Clone)]
pub struct ResolvedMultiTenant {
    pub cloud_backend_url: String,
    pub service_token: String,
    pub config_root: PathBuf,
    pub workspace_root: PathBuf,
    pub template_path: Option<PathBuf>,
    pub max_cached_users: usize,
    pub user_idle_timeout_ms: u64,
    pub sync_interval_ms: u64,
}

impl MultiTenantConfig {
    /// Validate the block and resolve the service token (config value first,
    /// then the `OPENCLAW_SERVICE_TOKEN` env var).
    ///
    /// Returns [`Error::Unavailable`] when disabled or when a required
    /// setting is missing — callers surface this and stay out of the
    /// multi-tenant branch.
    pub fn resolve(&self) -> Result<ResolvedMultiTenant> {
        if !self.enabled {
            return Err(Error::Unavailable(
                "multi-tenant mode is not enabled".into(),
            ));
        }
        let cloud_backend_url = self
            .cloud_backend_url
            .clone()
            .ok_or_else(|| Error::Unavailable("cloudBackendUrl is not set".into()))?;
        let service_token = self
            .service_token
            .clone()
            .or_else(|| std::env::var(SERVICE_TOKEN_ENV).ok())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::Unavailable(format!(
                    "serviceToken is not set (config or ${SERVICE_TOKEN_ENV})"
                ))
            })?;
        let config_root = self
            .config_root
            .clone()
            .ok_or_else(|| Error::Unavailable("configRoot is not set".into()))?;
        let workspace_root = self
            .workspace_root
            .clone()
            .ok_or_else(|| Error::Unavailable("workspaceRoot is not set".into()))?;

        Ok(ResolvedMultiTenant {
            cloud_backend_url,
            service_token,
            config_root: PathBuf::from(config_root),
            workspace_root: PathBuf::from(workspace_root),
            template_path: self.template_path.clone().map(PathBuf::from),
            max_cached_users: self.max_cached_users,
            user_idle_timeout_ms: self.user_idle_timeout_ms,
            sync_interval_ms: self.sync_interval_ms,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn enabled_block() -> MultiTenantConfig {
        MultiTenantConfig {
            enabled: true,
            cloud_backend_url: Some("https://cloud.example".into()),
            service_token: Some("svc_123".into()),
            config_root: Some("/var/lib/openclaw/config".into()),
            workspace_root: Some("/var/lib/openclaw/workspaces".into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let mt = MultiTenantConfig::default();
        assert!(!mt.enabled);
        assert_eq!(mt.max_cached_users, 100);
        assert_eq!(mt.user_idle_timeout_ms, 3_600_000);
        assert_eq!(mt.sync_interval_ms, 300_000);
    }

    #[test]
    fn disabled_block_is_unavailable() {
        let mt = MultiTenantConfig::default();
        assert!(matches!(mt.resolve(), Err(Error::Unavailable(_))));
    }

    #[test]
    fn resolve_requires_backend_url() {
        let mut mt = enabled_block();
        mt.cloud_backend_url = None;
        assert!(matches!(mt.resolve(), Err(Error::Unavailable(_))));
    }

    #[test]
    fn resolve_full_block() {
        let resolved = enabled_block().resolve().unwrap();
        assert_eq!(resolved.cloud_backend_url, "https://cloud.example");
        assert_eq!(resolved.service_token, "svc_123");
        assert_eq!(resolved.max_cached_users, 100);
        assert!(resolved.template_path.is_none());
    }

    #[test]
    fn parses_camel_case_keys() {
        let raw = r#"{
            // multi-tenant gateway settings
            "multiTenant": {
                "enabled": true,
                "cloudBackendUrl": "https://cloud.example",
                "serviceToken": "svc_1",
                "configRoot": "/cfg",
                "workspaceRoot": "/ws",
                "maxCachedUsers": 1000,
                "userIdleTimeoutMs": 1000,
                "syncIntervalMs": 2000,
            },
        }"#;
        let config: GlobalConfig = json5::from_str(raw).unwrap();
        let mt = config.multi_tenant.unwrap();
        assert!(mt.enabled);
        assert_eq!(mt.max_cached_users, 1000);
        assert_eq!(mt.user_idle_timeout_ms, 1000);
        assert_eq!(mt.sync_interval_ms, 2000);
    }
}
