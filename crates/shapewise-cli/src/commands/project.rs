//! Opening an initialized project and its configuration document.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shapewise::{Shapewise, ShapewiseOptions, Version};
use shapewise_config::{Paths, ShapewiseConfig};
use tracing::debug;

use crate::style::{colors::SemanticStyle, print_labeled};

/// An initialized project with its configuration document loaded.
pub struct Project {
    pub db: Shapewise,
    document_path: PathBuf,
}

impl Project {
    pub fn open(project: &str) -> Result<Self> {
        let project_dir = Path::new(project);
        let config = load_config(project_dir)?;

        let document_path = Paths::document_path(project_dir, &config.store);
        let db = Shapewise::open(&document_path, &options_from(&config))?;
        debug!(
            project = %config.project.name,
            document = %document_path.display(),
            version = %db.store().version(),
            "opened project"
        );

        Ok(Self {
            db,
            document_path,
        })
    }

    /// Writes the document back to disk.
    pub fn save(&self) -> Result<()> {
        self.db.save(&self.document_path)?;
        Ok(())
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    /// Delivers the committed document to every member and prints how far
    /// each one got.
    pub fn report_propagation(&self, committed: Version) {
        let members = self.db.sync_members();
        let current = members.iter().filter(|(_, v)| *v >= committed).count();
        print_labeled(
            "Propagated",
            &format!("{current}/{} members at version {committed}", members.len()),
        );
        for (id, version) in members.iter().filter(|(_, v)| *v < committed) {
            print_labeled(&id.to_string(), &format!("behind at {version}").warning());
        }
    }
}

/// Loads the merged configuration of an initialized project.
pub fn load_config(project_dir: &Path) -> Result<ShapewiseConfig> {
    if !Paths::is_initialized(project_dir) {
        anyhow::bail!(
            "Project not initialized. Run 'shapewise init {}' first.",
            project_dir.display()
        );
    }

    ShapewiseConfig::load_from_dir(project_dir).context("Failed to load configuration")
}

pub fn options_from(config: &ShapewiseConfig) -> ShapewiseOptions {
    ShapewiseOptions {
        channel_capacity: config.propagation.channel_capacity,
        members: config.propagation.members,
        pause_timeout: config.failpoint.pause_timeout(),
        ..ShapewiseOptions::default()
    }
}
