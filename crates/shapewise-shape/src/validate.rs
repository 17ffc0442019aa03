//! Structural validation of representative queries.
//!
//! Runs before any read of the configuration document, so a malformed
//! query never reaches the compare-and-swap cycle.

use serde_json::Value;
use shapewise_types::{Namespace, RepresentativeQuery};

use crate::ShapeError;

/// Checks that a representative query is well formed.
pub fn validate_query(query: &RepresentativeQuery) -> Result<(), ShapeError> {
    validate_namespace(query.namespace())?;

    match query {
        RepresentativeQuery::Find {
            filter,
            sort,
            projection,
            ..
        } => {
            require_object(filter, "filter")?;
            if let Some(sort) = sort {
                validate_sort(sort)?;
            }
            if let Some(projection) = projection {
                require_object(projection, "projection")?;
            }
        }
        RepresentativeQuery::Aggregate { pipeline, .. } => {
            for (index, stage) in pipeline.iter().enumerate() {
                validate_stage(index, stage)?;
            }
        }
        RepresentativeQuery::Distinct { key, query, .. } => {
            if key.is_empty() {
                return Err(ShapeError::EmptyDistinctKey);
            }
            if let Some(query) = query {
                require_object(query, "query")?;
            }
        }
    }

    Ok(())
}

fn validate_namespace(ns: &Namespace) -> Result<(), ShapeError> {
    if ns.db.is_empty() {
        return Err(ShapeError::EmptyDatabase);
    }
    if ns.coll.is_empty() {
        return Err(ShapeError::EmptyCollection);
    }
    if ns.is_internal() {
        return Err(ShapeError::InternalNamespace(ns.db.clone()));
    }
    Ok(())
}

fn require_object(value: &Value, field: &'static str) -> Result<(), ShapeError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ShapeError::NotAnObject(field))
    }
}

fn validate_sort(sort: &Value) -> Result<(), ShapeError> {
    let spec = sort.as_object().ok_or(ShapeError::NotAnObject("sort"))?;
    for (field, direction) in spec {
        let valid = match direction {
            Value::Number(n) => matches!(n.as_i64(), Some(1 | -1)),
            Value::Object(meta) => meta.contains_key("$meta"),
            _ => false,
        };
        if !valid {
            return Err(ShapeError::InvalidSort(field.clone()));
        }
    }
    Ok(())
}

fn validate_stage(index: usize, stage: &Value) -> Result<(), ShapeError> {
    match stage.as_object() {
        Some(map) if map.len() == 1 && map.keys().all(|k| k.starts_with('$')) => Ok(()),
        _ => Err(ShapeError::InvalidStage(index)),
    }
}
