//! The only configuration the core reads, via a typed-struct +
//! `#[serde(default)]` + dedicated-error `config::load` pattern.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub commands_folder: Option<PathBuf>,
    #[serde(default = "default_workflow_search_paths")]
    pub workflow_search_paths: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commands_folder: None,
            workflow_search_paths: default_workflow_search_paths(),
        }
    }
}

fn default_workflow_search_paths() -> Vec<PathBuf> {
    crate::workflow::default_search_paths()
}

impl EngineConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// The resolver search folders in priority order: the repo-configured
    /// override first (if any), then the built-in defaults directory.
    pub fn command_folders(&self, working_dir: &std::path::Path) -> Vec<PathBuf> {
        let mut folders = Vec::new();
        if let Some(folder) = &self.commands_folder {
            folders.push(folder.clone());
        }
        folders.push(working_dir.join(".archon").join("commands").join("defaults"));
        folders
    }
}
