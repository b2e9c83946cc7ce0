//! Deterministic derivation of per-tenant filesystem paths.
//!
//! Every user id that reaches the filesystem goes through
//! [`sanitize_user_id`] first; the derived paths can never escape
//! `{root}/users/`.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Upper bound on a sanitized user id.
pub const MAX_USER_ID_LEN: usize = 128;

/// Sanitize an untrusted user id for filesystem use.
///
/// Path separators and `..` sequences are mapped to `_`; any remaining
/// character outside `[A-Za-z0-9_-]` is dropped. Fails when the input (or
/// the sanitized result) is empty or exceeds [`MAX_USER_ID_LEN`].
pub fn sanitize_user_id(raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Err(Error::InvalidUserId("empty user id".into()));
    }
    if raw.len() > MAX_USER_ID_LEN {
        return Err(Error::InvalidUserId(format!(
            "user id exceeds {MAX_USER_ID_LEN} bytes"
        )));
    }

    let mapped = raw.replace("..", "_").replace(['/', '\\'], "_");
    let cleaned: String = mapped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if cleaned.is_empty() {
        return Err(Error::InvalidUserId(format!(
            "no usable characters in {raw:?}"
        )));
    }
    Ok(cleaned)
}

/// The resolved path set for one tenant.
#[derive(Debug, Clone)]
pub struct TenantPaths {
    /// Sanitized, canonical id.
    pub user_id: String,
    /// `{configRoot}/users/{id}/config.json`
    pub config_path: PathBuf,
    /// `{workspaceRoot}/users/{id}`
    pub workspace_path: PathBuf,
    /// `{workspace}/agent`
    pub agent_dir: PathBuf,
    /// `{workspace}/sessions`
    pub sessions_dir: PathBuf,
    /// `{workspace}/memory`
    pub memory_dir: PathBuf,
}

impl TenantPaths {
    /// Derive all per-tenant paths from the roots and an untrusted id.
    pub fn resolve(config_root: &Path, workspace_root: &Path, raw_user_id: &str) -> Result<Self> {
        let user_id = sanitize_user_id(raw_user_id)?;
        let workspace_path = workspace_root.join("users").join(&user_id);
        Ok(Self {
            config_path: config_root
                .join("users")
                .join(&user_id)
                .join("config.json"),
            agent_dir: workspace_path.join("agent"),
            sessions_dir: workspace_path.join("sessions"),
            memory_dir: workspace_path.join("memory"),
            workspace_path,
            user_id,
        })
    }

    /// `{workspace}/custom` — the per-user bootstrap-file override layer.
    pub fn custom_dir(&self) -> PathBuf {
        self.workspace_path.join("custom")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_for_clean_ids() {
        assert_eq!(sanitize_user_id("u-1").unwrap(), "u-1");
        assert_eq!(sanitize_user_id("User_42").unwrap(), "User_42");
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(matches!(
            sanitize_user_id(""),
            Err(Error::InvalidUserId(_))
        ));
        let long = "a".repeat(MAX_USER_ID_LEN + 1);
        assert!(matches!(
            sanitize_user_id(&long),
            Err(Error::InvalidUserId(_))
        ));
        assert!(sanitize_user_id(&"a".repeat(MAX_USER_ID_LEN)).is_ok());
    }

    #[test]
    fn neutralizes_traversal_attempts() {
        assert_eq!(sanitize_user_id("../etc/passwd").unwrap(), "__etc_passwd");
        assert_eq!(sanitize_user_id("a/../../b").unwrap(), "a_____b");
        assert_eq!(sanitize_user_id("..\\win").unwrap(), "__win");
    }

    #[test]
    fn drops_exotic_characters() {
        assert_eq!(sanitize_user_id("héllo wörld!").unwrap(), "hllowrld");
        assert!(matches!(
            sanitize_user_id("€€€"),
            Err(Error::InvalidUserId(_))
        ));
    }

    #[test]
    fn derived_paths_stay_under_users_root() {
        let config_root = Path::new("/cfg");
        let workspace_root = Path::new("/ws");
        // Hostile inputs still land under {root}/users/.
        for raw in ["../../escape", "a/b/c", "..", "x\\..\\y", ".hidden"] {
            let Ok(paths) = TenantPaths::resolve(config_root, workspace_root, raw) else {
                continue;
            };
            assert!(
                paths.workspace_path.starts_with("/ws/users"),
                "escaped: {:?}",
                paths.workspace_path
            );
            assert!(paths.config_path.starts_with("/cfg/users"));
            assert!(!paths.user_id.contains('/'));
            assert!(!paths.user_id.contains(".."));
        }
    }

    #[test]
    fn path_layout_matches_contract() {
        let paths =
            TenantPaths::resolve(Path::new("/cfg"), Path::new("/ws"), "u-1").unwrap();
        assert_eq!(paths.config_path, Path::new("/cfg/users/u-1/config.json"));
        assert_eq!(paths.workspace_path, Path::new("/ws/users/u-1"));
        assert_eq!(paths.agent_dir, Path::new("/ws/users/u-1/agent"));
        assert_eq!(paths.sessions_dir, Path::new("/ws/users/u-1/sessions"));
        assert_eq!(paths.memory_dir, Path::new("/ws/users/u-1/memory"));
        assert_eq!(paths.custom_dir(), Path::new("/ws/users/u-1/custom"));
    }
}
