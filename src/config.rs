//! Workspace configuration.
//!
//! Read from `<root>/certify.json` when present; every field has a default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CertResult, IoContext};
use crate::print::PrintSpec;

pub const CONFIG_FILE: &str = "certify.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    #[serde(skip)]
    pub root: PathBuf,
    pub events_dir: String,
    pub templates_dir: String,
    pub backups_dir: String,
    pub fonts_dir: String,
    pub font_family: String,
    pub print: PrintSpec,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            events_dir: "events".into(),
            templates_dir: "templates".into(),
            backups_dir: "backups".into(),
            fonts_dir: "fonts".into(),
            font_family: "Roboto".into(),
            print: PrintSpec::default(),
        }
    }
}

impl WorkspaceConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Defaults, overridden by `certify.json` under `root` if it exists.
    pub fn load(root: impl Into<PathBuf>) -> CertResult<Self> {
        let root = root.into();
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::with_root(root));
        }

        let content = fs::read_to_string(&path).io_context("read config", &path)?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.print.check()?;
        config.root = root;
        tracing::debug!(config = %path.display(), "loaded workspace config");
        Ok(config)
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join(&self.events_dir)
    }

    pub fn templates_path(&self) -> PathBuf {
        self.root.join(&self.templates_dir)
    }

    pub fn backups_path(&self) -> PathBuf {
        self.root.join(&self.backups_dir)
    }

    pub fn fonts_path(&self) -> PathBuf {
        self.root.join(&self.fonts_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the events, templates, backups and fonts folders.
    pub fn ensure_dirs(&self) -> CertResult<Vec<PathBuf>> {
        let dirs = vec![
            self.events_path(),
            self.templates_path(),
            self.backups_path(),
            self.fonts_path(),
        ];
        for dir in &dirs {
            fs::create_dir_all(dir).io_context("create folder", dir)?;
        }
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::PrintAuthority;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = WorkspaceConfig::load(dir.path()).unwrap();
        assert_eq!(config.events_path(), dir.path().join("events"));
        assert_eq!(config.print, PrintSpec::default());
    }

    #[test]
    fn partial_file_overrides_some_fields() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"font_family": "DejaVu Sans", "print": {"authority": "user", "dpi": 300}}"#,
        )
        .unwrap();

        let config = WorkspaceConfig::load(dir.path()).unwrap();
        assert_eq!(config.font_family, "DejaVu Sans");
        assert_eq!(config.templates_dir, "templates");
        assert_eq!(config.print.dpi, 300);
        assert_eq!(config.print.jpeg_quality, 92);
        assert_eq!(config.print.authority, PrintAuthority::User);
    }

    #[test]
    fn invalid_print_settings_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"print": {"dpi": 5}}"#).unwrap();
        assert!(WorkspaceConfig::load(dir.path()).unwrap_err().is_validation());
    }

    #[test]
    fn ensure_dirs_creates_skeleton() {
        let dir = TempDir::new().unwrap();
        let config = WorkspaceConfig::with_root(dir.path());
        config.ensure_dirs().unwrap();
        assert!(config.events_path().is_dir());
        assert!(config.fonts_path().is_dir());
    }
}
