//! Layered read/write over a tenant workspace.
//!
//! Bootstrap files resolve `custom > template > builtin`; writes always land
//! in the per-user `custom/` layer so templates and defaults stay pristine.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    bootstrap::builtin_default,
    error::Result,
    fsutil::write_restricted,
};

/// The layer that serves (or would serve) a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Custom,
    Template,
    Builtin,
    Missing,
}

/// A by-value handle over one tenant's workspace files.
///
/// Holds no reference back to the manager; cloning is cheap and safe to hand
/// to agent execution.
#[derive(Debug, Clone)]
pub struct WorkspaceResolver {
    user_id: String,
    workspace_path: PathBuf,
    template_path: Option<PathBuf>,
}

impl WorkspaceResolver {
    pub fn new(
        user_id: impl Into<String>,
        workspace_path: impl Into<PathBuf>,
        template_path: Option<PathBuf>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            workspace_path: workspace_path.into(),
            template_path,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }

    fn custom_dir(&self) -> PathBuf {
        self.workspace_path.join("custom")
    }

    fn memory_dir(&self) -> PathBuf {
        self.workspace_path.join("memory")
    }

    /// Read a bootstrap file through the layer chain. `Ok(None)` only when
    /// all three layers miss.
    pub fn read(&self, filename: &str) -> Result<Option<String>> {
        let name = basename(filename);

        if let Some(content) = read_optional(&self.custom_dir().join(&name))? {
            return Ok(Some(content));
        }
        if let Some(ref template) = self.template_path {
            if let Some(content) = read_optional(&template.join(&name))? {
                return Ok(Some(content));
            }
        }
        Ok(builtin_default(&name).map(str::to_owned))
    }

    /// Write a bootstrap file into the custom layer (owner-only modes).
    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf> {
        let name = basename(filename);
        let path = self.custom_dir().join(&name);
        write_restricted(&path, content)?;
        debug!(user_id = %self.user_id, file = %name, "wrote custom bootstrap file");
        Ok(path)
    }

    /// Which layer would serve a read of `filename`.
    pub fn resolve(&self, filename: &str) -> Layer {
        let name = basename(filename);
        if self.custom_dir().join(&name).is_file() {
            return Layer::Custom;
        }
        if let Some(ref template) = self.template_path {
            if template.join(&name).is_file() {
                return Layer::Template;
            }
        }
        if builtin_default(&name).is_some() {
            return Layer::Builtin;
        }
        Layer::Missing
    }

    /// Read today's memory file (`memory/YYYY-MM-DD.md`, local calendar).
    pub fn read_today_memory(&self) -> Result<Option<String>> {
        read_optional(&self.today_memory_path())
    }

    /// Write today's memory file, creating `memory/` as needed.
    pub fn write_today_memory(&self, content: &str) -> Result<PathBuf> {
        let path = self.today_memory_path();
        write_restricted(&path, content)?;
        Ok(path)
    }

    fn today_memory_path(&self) -> PathBuf {
        self.memory_dir()
            .join(format!("{}.md", clawden_common::time::today_stamp()))
    }

    /// List file names in the workspace (or a subdirectory of it). A missing
    /// directory is an empty listing, not an error.
    pub fn list_files(&self, subdir: Option<&str>) -> Result<Vec<String>> {
        let dir = match subdir {
            Some(sub) => self.workspace_path.join(basename(sub)),
            None => self.workspace_path.clone(),
        };
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Reduce a filename argument to its basename, neutralizing traversal.
fn basename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read a file, translating "does not exist" into `None`.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::bootstrap::{MEMORY_FILE, SOUL_FILE};

    fn resolver_with_template(tmp: &Path) -> WorkspaceResolver {
        let workspace = tmp.join("users").join("u-1");
        let template = tmp.join("template");
        fs::create_dir_all(&workspace).unwrap();
        fs::create_dir_all(&template).unwrap();
        WorkspaceResolver::new("u-1", workspace, Some(template))
    }

    #[test]
    fn custom_beats_template_beats_builtin() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = resolver_with_template(tmp.path());
        let template = tmp.path().join("template");

        // Builtin only.
        assert_eq!(resolver.resolve(SOUL_FILE), Layer::Builtin);
        let builtin = resolver.read(SOUL_FILE).unwrap().unwrap();
        assert!(builtin.contains("SOUL.md"));

        // Template overrides builtin.
        fs::write(template.join(SOUL_FILE), "template soul").unwrap();
        assert_eq!(resolver.resolve(SOUL_FILE), Layer::Template);
        assert_eq!(resolver.read(SOUL_FILE).unwrap().unwrap(), "template soul");

        // Custom overrides both.
        resolver.write(SOUL_FILE, "custom soul").unwrap();
        assert_eq!(resolver.resolve(SOUL_FILE), Layer::Custom);
        assert_eq!(resolver.read(SOUL_FILE).unwrap().unwrap(), "custom soul");

        // Peel the layers back off.
        fs::remove_file(resolver.custom_dir().join(SOUL_FILE)).unwrap();
        assert_eq!(resolver.read(SOUL_FILE).unwrap().unwrap(), "template soul");
        fs::remove_file(template.join(SOUL_FILE)).unwrap();
        assert_eq!(resolver.read(SOUL_FILE).unwrap().unwrap(), builtin);
    }

    #[test]
    fn unknown_file_misses_everywhere() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = resolver_with_template(tmp.path());
        assert_eq!(resolver.resolve("NOTES.md"), Layer::Missing);
        assert!(resolver.read("NOTES.md").unwrap().is_none());
    }

    #[test]
    fn traversal_in_filename_is_reduced_to_basename() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = resolver_with_template(tmp.path());

        let written = resolver.write("../../escape/SOUL.md", "contained").unwrap();
        assert!(written.starts_with(resolver.custom_dir()));
        assert_eq!(
            resolver.read("nested/dir/SOUL.md").unwrap().unwrap(),
            "contained"
        );
    }

    #[test]
    fn today_memory_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = resolver_with_template(tmp.path());

        assert!(resolver.read_today_memory().unwrap().is_none());
        let path = resolver.write_today_memory("note for today").unwrap();
        assert!(path.starts_with(resolver.memory_dir()));
        assert_eq!(
            resolver.read_today_memory().unwrap().unwrap(),
            "note for today"
        );
    }

    #[test]
    fn list_files_on_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = resolver_with_template(tmp.path());
        assert!(resolver.list_files(Some("sessions")).unwrap().is_empty());

        resolver.write_today_memory("x").unwrap();
        let listed = resolver.list_files(Some("memory")).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].ends_with(".md"));
    }

    #[test]
    fn builtin_default_survives_without_template_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver =
            WorkspaceResolver::new("u-2", tmp.path().join("users").join("u-2"), None);
        assert_eq!(resolver.resolve(MEMORY_FILE), Layer::Builtin);
        assert!(resolver.read(MEMORY_FILE).unwrap().is_some());
    }
}
