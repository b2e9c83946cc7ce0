//! Restricted-permission filesystem helpers.
//!
//! Tenant directories are `0700` and credential-bearing files `0600`; these
//! wrappers apply the modes after creation. On non-unix targets the mode
//! calls are skipped.

use std::{fs, path::Path};

use crate::error::Result;

/// Create `dir` (and parents) with owner-only permissions. Pre-existing
/// directories are left alone.
pub fn create_dir_restricted(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    set_mode(dir, 0o700)?;
    Ok(())
}

/// Write `content` to `path` with owner-only permissions, creating the
/// parent directory (also owner-only) as needed.
pub fn write_restricted(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_restricted(parent)?;
    }
    fs::write(path, content)?;
    set_mode(path, 0o600)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn writes_with_parent_creation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a").join("b").join("secret.json");
        write_restricted(&path, "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[cfg(unix)]
    #[test]
    fn modes_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("d");
        create_dir_restricted(&dir).unwrap();
        assert_eq!(
            fs::metadata(&dir).unwrap().permissions().mode() & 0o777,
            0o700
        );

        let file = dir.join("cred.json");
        write_restricted(&file, "x").unwrap();
        assert_eq!(
            fs::metadata(&file).unwrap().permissions().mode() & 0o777,
            0o600
        );
    }

    #[test]
    fn existing_dir_is_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("keep");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("marker"), "1").unwrap();
        create_dir_restricted(&dir).unwrap();
        assert!(dir.join("marker").is_file());
    }
}
