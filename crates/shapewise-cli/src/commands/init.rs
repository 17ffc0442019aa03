//! Initialize command - creates a new Shapewise project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use shapewise::Shapewise;
use shapewise_config::{LOCAL_CONFIG_FILE, PROJECT_CONFIG_FILE, Paths, STATE_DIR, ShapewiseConfig};

use super::project::options_from;
use crate::style::{
    colors::SemanticStyle, print_labeled, print_next_step, print_success, print_version,
};

fn gitignore() -> String {
    format!(
        "# Shapewise local state, including the configuration document\n{STATE_DIR}/\n\n\
         # Local config overrides (not tracked in git)\n{LOCAL_CONFIG_FILE}\n"
    )
}

pub fn run(path: &str, name: Option<&str>) -> Result<()> {
    let project_dir = Path::new(path);

    if Paths::is_initialized(project_dir) {
        anyhow::bail!(
            "Project already initialized in {}. {PROJECT_CONFIG_FILE} already exists.",
            project_dir.display()
        );
    }

    fs::create_dir_all(Paths::state_dir(project_dir))
        .context("Failed to create project directory")?;

    // Config is written with relative paths so the project can move.
    let mut config = ShapewiseConfig::default();
    config.project.name = name
        .map(ToString::to_string)
        .or_else(|| {
            project_dir
                .canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or(config.project.name);

    let config_path = Paths::project_config_file(project_dir);
    fs::write(&config_path, config.to_toml_string()?)
        .context("Failed to write shapewise.toml")?;

    let gitignore_path = project_dir.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(&gitignore_path, gitignore()).context("Failed to write .gitignore")?;
    }

    // Empty document at version 0
    let document_path = Paths::document_path(project_dir, &config.store);
    let db = Shapewise::open(&document_path, &options_from(&config))?;
    db.save(&document_path)?;

    print_success("Project initialized");
    print_labeled("Name", &config.project.name);
    print_labeled("Config", &config_path.display().to_string().code());
    print_labeled("Document", &document_path.display().to_string().code());
    print_version(db.store().version());

    println!();
    println!("{}", "Next steps:".header());
    print_next_step(
        "Attach settings to a query shape:",
        &format!(
            "shapewise set --project {path} --ns db.coll --filter '{{\"a\": 1}}' --settings '{{\"reject\": true}}'"
        ),
    );
    print_next_step(
        "List them:",
        &format!("shapewise list --project {path}"),
    );

    Ok(())
}
