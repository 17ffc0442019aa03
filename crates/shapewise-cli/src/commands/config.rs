//! Configuration management commands.

use anyhow::Result;
use std::path::Path;

use shapewise_config::Paths;

use super::project::load_config;
use crate::style::{colors::SemanticStyle, print_error, print_info_table, print_success};

/// Show current configuration.
pub fn show(project: &str, format: &str) -> Result<()> {
    let project_dir = Path::new(project);
    let config = load_config(project_dir)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        "toml" => {
            println!("{}", config.to_toml_string()?);
        }
        "text" => {
            println!("{}", "Shapewise Configuration".header());
            print_info_table(&[
                ("Project", config.project.name.clone()),
                (
                    "Document",
                    Paths::document_path(project_dir, &config.store)
                        .display()
                        .to_string(),
                ),
                (
                    "Channel capacity",
                    config.propagation.channel_capacity.to_string(),
                ),
                ("Members", config.propagation.members.to_string()),
                (
                    "Pause timeout",
                    format!("{} ms", config.failpoint.pause_timeout_ms),
                ),
                ("Log level", config.logging.level.clone()),
            ]);
        }
        other => anyhow::bail!("Unknown format '{other}'. Expected 'text', 'json' or 'toml'."),
    }

    Ok(())
}

/// Validate configuration files.
pub fn validate(project: &str) -> Result<()> {
    match load_config(Path::new(project)) {
        Ok(_) => {
            print_success("Configuration is valid");
            Ok(())
        }
        Err(e) => {
            print_error("Configuration validation failed:");
            Err(e)
        }
    }
}
