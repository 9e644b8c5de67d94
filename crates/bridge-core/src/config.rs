//! Application configuration: YAML file plus environment overrides.
//!
//! Credentials and the parent page id are validated here, before the sync
//! engine is ever constructed — the core never checks configuration
//! itself.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Notion API token not set (config notion.token or NOTION_TOKEN)")]
    MissingToken,

    #[error("Notion parent page id not set (config notion.parent_page_id or NOTION_PARENT_PAGE_ID)")]
    MissingParentPage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub notion: NotionConfig,
    pub sync: SyncConfig,
    pub directories: DirectoriesConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    pub token: String,
    pub parent_page_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// "push", "pull", or "both"
    pub direction: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig { direction: "push".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoriesConfig {
    pub markdown_root: PathBuf,
    pub excluded_patterns: Vec<String>,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        DirectoriesConfig {
            markdown_root: PathBuf::from("./docs"),
            excluded_patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Load from a YAML file and apply environment overrides
    /// (`NOTION_TOKEN`, `NOTION_PARENT_PAGE_ID`). A missing file yields
    /// the defaults, so `validate` reports what is actually missing.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(source) => {
                return Err(ConfigError::Read { path: path.to_path_buf(), source });
            }
        };

        if let Ok(token) = std::env::var("NOTION_TOKEN") {
            if !token.is_empty() {
                config.notion.token = token;
            }
        }
        if let Ok(parent) = std::env::var("NOTION_PARENT_PAGE_ID") {
            if !parent.is_empty() {
                config.notion.parent_page_id = parent;
            }
        }

        Ok(config)
    }

    /// Write the config back out, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        let yaml = serde_yaml::to_string(self).expect("config serializes");
        std::fs::write(path, yaml).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A starter config for `init`.
    pub fn starter() -> Config {
        Config {
            directories: DirectoriesConfig {
                markdown_root: PathBuf::from("./docs"),
                excluded_patterns: vec!["*.tmp".to_string(), "node_modules/**".to_string()],
            },
            ..Config::default()
        }
    }

    /// Check the fields the engine needs. The parent page id is only
    /// required when pushing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notion.token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if matches!(self.sync.direction.as_str(), "push" | "both")
            && self.notion.parent_page_id.is_empty()
        {
            return Err(ConfigError::MissingParentPage);
        }
        Ok(())
    }
}
