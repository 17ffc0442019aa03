//! Where a project keeps its configuration and its configuration document.
//!
//! ```text
//! <project>/
//!   shapewise.toml          tracked project config, marks the project as initialized
//!   shapewise.local.toml    untracked overrides
//!   .shapewise/data/        store.data_dir (default)
//!     query_settings.json   store.document_file (default)
//! ~/.config/shapewise/config.toml   per-user defaults
//! ```

use crate::{ConfigError, StoreConfig};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const PROJECT_CONFIG_FILE: &str = "shapewise.toml";
pub const LOCAL_CONFIG_FILE: &str = "shapewise.local.toml";
pub const STATE_DIR: &str = ".shapewise";

/// Path layout of a Shapewise project and the current user.
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("com", "Shapewise", "shapewise"),
        }
    }

    /// `config.toml` in the platform's per-user config directory.
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoUserConfigDir)
    }

    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(PROJECT_CONFIG_FILE)
    }

    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(LOCAL_CONFIG_FILE)
    }

    /// Local state that never belongs in version control.
    pub fn state_dir(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(STATE_DIR)
    }

    /// A project is initialized once its `shapewise.toml` exists.
    pub fn is_initialized(project_dir: impl AsRef<Path>) -> bool {
        Self::project_config_file(project_dir).exists()
    }

    /// Anchors a configured path at the project directory unless absolute.
    pub fn resolve(project_dir: impl AsRef<Path>, path: &Path) -> PathBuf {
        if path.is_relative() {
            project_dir.as_ref().join(path)
        } else {
            path.to_path_buf()
        }
    }

    /// The persisted configuration document that `store` points at.
    ///
    /// Saves of this file are guarded by a sibling `<file>.lock` in the same
    /// directory.
    pub fn document_path(project_dir: impl AsRef<Path>, store: &StoreConfig) -> PathBuf {
        Self::resolve(project_dir, &store.data_dir).join(&store.document_file)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
