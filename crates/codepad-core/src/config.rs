use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::WorkspaceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Project opened at startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Base URL of the HTTP project store (e.g., https://pad.example.com).
    /// The directory store under `data_dir` is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,

    /// Root of the directory-backed project store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding `<template>.json` starter trees
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Directory the sandbox filesystem is mirrored into
    #[serde(default = "default_sandbox_dir")]
    pub sandbox_dir: PathBuf,

    /// Quiet period before an edited buffer is mirrored into the sandbox
    #[serde(default = "default_mirror_debounce")]
    pub mirror_debounce_ms: u64,

    /// Quiet period before the active buffer is saved to the store
    #[serde(default = "default_autosave_delay")]
    pub autosave_delay_ms: u64,
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("projects"))
        .unwrap_or_else(|| PathBuf::from("codepad-projects"))
}
fn default_templates_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("templates"))
        .unwrap_or_else(|| PathBuf::from("codepad-templates"))
}
fn default_sandbox_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().join("sandbox"))
        .unwrap_or_else(|| PathBuf::from("codepad-sandbox"))
}
fn default_mirror_debounce() -> u64 {
    500
}
fn default_autosave_delay() -> u64 {
    3000
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "codepad", "codepad")
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            store_url: None,
            data_dir: default_data_dir(),
            templates_dir: default_templates_dir(),
            sandbox_dir: default_sandbox_dir(),
            mirror_debounce_ms: default_mirror_debounce(),
            autosave_delay_ms: default_autosave_delay(),
        }
    }
}

impl WorkspaceConfig {
    /// Default config file path for this platform
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = project_dirs() {
            dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("codepad-config.json")
        }
    }

    /// Load config from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        Ok(config)
    }

    /// Save config to a file path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn mirror_delay(&self) -> Duration {
        Duration::from_millis(self.mirror_debounce_ms)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    /// Project to open when none is given on the command line
    pub fn require_project_id(&self) -> crate::Result<&str> {
        self.project_id.as_deref().ok_or_else(|| {
            WorkspaceError::Config("no project id given and none configured".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: WorkspaceConfig = serde_json::from_str(r#"{"project_id": "p1"}"#).unwrap();
        assert_eq!(config.project_id.as_deref(), Some("p1"));
        assert_eq!(config.mirror_delay(), Duration::from_millis(500));
        assert_eq!(config.autosave_delay(), Duration::from_millis(3000));
        assert!(config.store_url.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = WorkspaceConfig {
            project_id: Some("demo".to_string()),
            autosave_delay_ms: 1500,
            ..WorkspaceConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = WorkspaceConfig::load(&path).unwrap();
        assert_eq!(loaded.project_id.as_deref(), Some("demo"));
        assert_eq!(loaded.autosave_delay_ms, 1500);
    }

    #[test]
    fn test_missing_project_id_is_config_error() {
        let err = WorkspaceConfig::default().require_project_id().unwrap_err();
        assert!(matches!(err, WorkspaceError::Config(_)));

        let config = WorkspaceConfig {
            project_id: Some("p1".to_string()),
            ..WorkspaceConfig::default()
        };
        assert_eq!(config.require_project_id().unwrap(), "p1");
    }
}
