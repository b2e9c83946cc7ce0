use std::{
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    schema::GlobalConfig,
};

/// Env var naming an explicit global config path (checked first).
pub const GLOBAL_CONFIG_ENV: &str = "OPENCLAW_GLOBAL_CONFIG";

/// System-wide config location.
const ETC_CONFIG: &str = "/etc/openclaw/config.json";

/// Home-relative config locations, checked in order.
const HOME_CONFIG_FILES: &[&str] = &[".clawdbot/openclaw.json", ".openclaw/openclaw.json"];

/// How long a loaded config is served from memory before re-reading disk.
const CACHE_TTL: Duration = Duration::from_secs(60);

static CACHE: Mutex<Option<(Instant, GlobalConfig)>> = Mutex::new(None);

/// Find the first existing global config file.
pub fn find_global_config_file() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(GLOBAL_CONFIG_ENV) {
        if !explicit.is_empty() {
            let p = PathBuf::from(explicit);
            if p.exists() {
                return Some(p);
            }
            warn!(path = %p.display(), "${} points at a missing file", GLOBAL_CONFIG_ENV);
        }
    }

    let etc = PathBuf::from(ETC_CONFIG);
    if etc.exists() {
        return Some(etc);
    }

    if let Some(base) = directories::BaseDirs::new() {
        for rel in HOME_CONFIG_FILES {
            let p = base.home_dir().join(rel);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Load and parse a specific config file (JSON5: comments and trailing
/// commas allowed).
pub fn load_global_from(path: &Path) -> Result<GlobalConfig> {
    let raw = std::fs::read_to_string(path)?;
    json5::from_str(&raw).map_err(|e| Error::Parse(format!("{}: {e}", path.display())))
}

/// Discover and load the global config, serving a cached copy for up to
/// 60 seconds.
///
/// Missing or malformed files degrade to `GlobalConfig::default()` (multi-
/// tenant inert) with a warning; the gateway never refuses to start over a
/// bad global config.
pub fn load_global() -> GlobalConfig {
    {
        let cache = CACHE.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((loaded_at, ref config)) = *cache {
            if loaded_at.elapsed() < CACHE_TTL {
                return config.clone();
            }
        }
    }

    let config = match find_global_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading global config");
            match load_global_from(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load global config, using defaults");
                    GlobalConfig::default()
                },
            }
        },
        None => {
            debug!("no global config found, using defaults");
            GlobalConfig::default()
        },
    };

    let mut cache = CACHE.lock().unwrap_or_else(|e| e.into_inner());
    *cache = Some((Instant::now(), config.clone()));
    config
}

/// Drop the cached config so the next [`load_global`] re-reads disk.
/// Exposed for tests and for config-reload commands.
pub fn reset_cache() {
    let mut cache = CACHE.lock().unwrap_or_else(|e| e.into_inner());
    *cache = None;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // Env mutation is process-global, so everything that touches
    // OPENCLAW_GLOBAL_CONFIG lives in this single test.
    #[test]
    fn env_override_discovery_and_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("global.json");
        std::fs::write(
            &path,
            r#"{
                // trailing commas and comments are fine
                "multiTenant": { "enabled": true, "cloudBackendUrl": "https://a", },
            }"#,
        )
        .unwrap();

        std::env::set_var(GLOBAL_CONFIG_ENV, &path);
        reset_cache();

        let found = find_global_config_file().unwrap();
        assert_eq!(found, path);

        let config = load_global();
        assert!(config.multi_tenant_enabled());

        // Rewrite the file; the cached copy is served until reset.
        std::fs::write(&path, r#"{ "multiTenant": { "enabled": false } }"#).unwrap();
        let cached = load_global();
        assert!(cached.multi_tenant_enabled());

        reset_cache();
        let fresh = load_global();
        assert!(!fresh.multi_tenant_enabled());

        std::env::remove_var(GLOBAL_CONFIG_ENV);
        reset_cache();
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{ not json5 at all ]").unwrap();
        assert!(matches!(
            load_global_from(&path),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn empty_object_parses_to_inert_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.json");
        std::fs::write(&path, "{}").unwrap();
        let config = load_global_from(&path).unwrap();
        assert!(config.multi_tenant.is_none());
        assert!(!config.multi_tenant_enabled());
    }
}
