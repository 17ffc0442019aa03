//! Set command - attaches settings to a query shape.

use anyhow::Result;
use shapewise::{Change, QuerySettings};

use super::project::Project;
use super::query::{QueryArgs, Target, parse_json};
use crate::style::{print_labeled, print_shape_hash, print_success, print_version};

pub fn run(project: &str, query: &QueryArgs, hash: Option<&str>, settings: &str) -> Result<()> {
    // Arguments are checked before the document is touched.
    let target = query.target(hash)?;
    let settings = QuerySettings::new(parse_json("--settings", settings)?);

    let project = Project::open(project)?;
    let processor = project.db.processor();
    let outcome = match &target {
        Target::Query(query) => processor.set_query_settings(query, settings)?,
        Target::Hash(key) => processor.set_query_settings_by_hash(*key, settings)?,
    };
    project.save()?;

    let verb = match outcome.change {
        Change::Inserted => "Created",
        _ => "Updated",
    };
    print_success(&format!("{verb} query settings"));
    print_shape_hash(&outcome.shape_key);
    if let Target::Query(query) = &target {
        print_labeled("Namespace", &query.namespace().to_string());
    }
    print_version(outcome.document.version);
    project.report_propagation(outcome.document.version);

    Ok(())
}
