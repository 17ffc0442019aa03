//! Configuration management for Shapewise
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (SHAPEWISE_* prefix, highest precedence)
//! 2. shapewise.local.toml (gitignored, local overrides)
//! 3. shapewise.toml (git-tracked, project config)
//! 4. ~/.config/shapewise/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::{LOCAL_CONFIG_FILE, PROJECT_CONFIG_FILE, Paths, STATE_DIR};

/// Log levels accepted by `[logging] level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main Shapewise configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapewiseConfig {
    pub project: ProjectConfig,
    pub store: StoreConfig,
    pub propagation: PropagationConfig,
    pub failpoint: FailpointConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "shapewise-project".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub document_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".shapewise/data"),
            document_file: "query_settings.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Documents buffered per slow member before it falls back to pulling.
    pub channel_capacity: usize,
    pub members: u32,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            members: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailpointConfig {
    pub pause_timeout_ms: u64,
}

impl Default for FailpointConfig {
    fn default() -> Self {
        Self {
            pause_timeout_ms: 30_000,
        }
    }
}

impl FailpointConfig {
    pub fn pause_timeout(&self) -> Duration {
        Duration::from_millis(self.pause_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ShapewiseConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Anchors relative paths at `project_dir`.
    pub fn resolve_paths(&mut self, project_dir: impl AsRef<Path>) {
        self.store.data_dir = Paths::resolve(project_dir, &self.store.data_dir);
    }

    /// Rejects settings the store cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.propagation.channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "propagation.channel_capacity",
                "must be greater than zero",
            ));
        }
        if self.store.document_file.trim().is_empty() {
            return Err(ConfigError::invalid(
                "store.document_file",
                "must not be empty",
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!(
                    "must be one of {}, got '{}'",
                    LOG_LEVELS.join(", "),
                    self.logging.level
                ),
            ));
        }
        Ok(())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
