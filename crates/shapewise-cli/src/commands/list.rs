//! List command.

use anyhow::Result;

use super::project::Project;
use crate::style::{colors::SemanticStyle, print_entries_table, print_labeled, print_version};

pub fn run(project: &str, format: &str, debug_shape: bool) -> Result<()> {
    let project = Project::open(project)?;
    let entries = project.db.processor().query_settings(debug_shape)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        "table" => {
            let version = project.db.store().version();
            print_labeled("Document", &project.document_path().display().to_string().code());
            print_version(version);
            println!();

            let mut columns = vec!["Shape hash", "Namespace", "Command", "Settings"];
            if debug_shape {
                columns.push("Query shape");
            }

            let rows: Vec<Vec<String>> = entries
                .iter()
                .map(|entry| {
                    let mut row = vec![
                        entry.query_shape_hash.to_string(),
                        entry.namespace.to_string(),
                        entry
                            .representative_query
                            .as_ref()
                            .map_or("-", |q| q.command_name())
                            .to_string(),
                        entry.settings.as_value().to_string(),
                    ];
                    if debug_shape {
                        row.push(
                            entry
                                .debug_query_shape
                                .as_ref()
                                .map_or_else(|| "-".to_string(), ToString::to_string),
                        );
                    }
                    row
                })
                .collect();

            print_entries_table(&columns, &rows);
        }
        other => anyhow::bail!("Unknown format '{other}'. Expected 'table' or 'json'."),
    }

    Ok(())
}
