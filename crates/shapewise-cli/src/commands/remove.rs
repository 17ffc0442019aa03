//! Remove commands.

use anyhow::Result;

use super::project::Project;
use super::query::{QueryArgs, Target};
use crate::style::{
    colors::SemanticStyle, print_shape_hash, print_success, print_version, print_warn,
};

/// Removes the settings of one shape.
pub fn run(project: &str, query: &QueryArgs, hash: Option<&str>) -> Result<()> {
    let target = query.target(hash)?;

    let project = Project::open(project)?;
    let processor = project.db.processor();
    let outcome = match &target {
        Target::Query(query) => processor.remove_query_settings(query)?,
        Target::Hash(key) => processor.remove_query_settings_by_hash(*key)?,
    };

    if !outcome.committed() {
        print_warn(&format!(
            "No query settings for shape {}, nothing removed",
            outcome.shape_key.to_string().code()
        ));
        print_version(outcome.document.version);
        return Ok(());
    }

    project.save()?;
    print_success("Removed query settings");
    print_shape_hash(&outcome.shape_key);
    print_version(outcome.document.version);
    project.report_propagation(outcome.document.version);

    Ok(())
}

/// Clears every entry.
pub fn run_all(project: &str) -> Result<()> {
    let project = Project::open(project)?;
    let removed = project.db.store().read().len();

    let document = project.db.processor().remove_all_query_settings();
    project.save()?;

    print_success(&format!("Removed all query settings ({removed} entries)"));
    print_version(document.version);
    project.report_propagation(document.version);

    Ok(())
}
