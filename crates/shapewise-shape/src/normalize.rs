//! Literal erasure.
//!
//! Every literal becomes a type placeholder; objects and operator nesting
//! are kept. What a `$`-prefixed string means depends on where it sits: in
//! a filter `{a: "$x"}` matches the string `"$x"` and is erased like any
//! other literal, while inside `$expr` or a computing stage `"$x"` is a
//! path to field `x` and is kept verbatim.

use serde_json::{Map, Value, json};
use shapewise_types::RepresentativeQuery;

use crate::ShapeError;
use crate::validate::validate_query;

const LOGICAL_OPERATORS: [&str; 3] = ["$and", "$or", "$nor"];

/// Stages whose single argument is a plain number.
const NUMERIC_STAGES: [&str; 2] = ["$limit", "$skip"];

/// Switches a filter into expression context.
const EXPR: &str = "$expr";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    /// Query-language predicates.
    Filter,
    /// Aggregation expressions, where `$`-strings are field paths.
    Expression,
}

/// Returns the normalized shape of a representative query.
///
/// The shape embeds the namespace and the command name, so the same filter
/// on two collections (or as `find` vs `distinct`) yields different shapes.
pub fn query_shape(query: &RepresentativeQuery) -> Result<Value, ShapeError> {
    validate_query(query)?;

    let ns = query.namespace();
    let mut shape = Map::new();
    shape.insert("cmdNs".into(), json!({"db": ns.db, "coll": ns.coll}));
    shape.insert("command".into(), Value::from(query.command_name()));

    match query {
        RepresentativeQuery::Find {
            filter,
            sort,
            projection,
            ..
        } => {
            shape.insert("filter".into(), shape_filter(filter));
            if let Some(sort) = sort {
                shape.insert("sort".into(), sort.clone());
            }
            if let Some(projection) = projection {
                shape.insert("projection".into(), shape_projection(projection));
            }
        }
        RepresentativeQuery::Aggregate { pipeline, .. } => {
            let stages = pipeline.iter().map(shape_stage).collect();
            shape.insert("pipeline".into(), Value::Array(stages));
        }
        RepresentativeQuery::Distinct { key, query, .. } => {
            shape.insert("key".into(), Value::from(key.as_str()));
            let filter = query.as_ref().map_or_else(|| json!({}), shape_filter);
            shape.insert("query".into(), filter);
        }
    }

    Ok(Value::Object(shape))
}

/// Returns the placeholder a literal is replaced with.
///
/// Every string is a literal here, `$`-prefixed or not. Objects and arrays
/// are not literals; they map to `"?object"` and `"?array<>"` only when
/// asked directly.
pub fn placeholder_for(value: &Value) -> Value {
    let tag = match value {
        Value::Null => "?null",
        Value::Bool(_) => "?bool",
        Value::Number(_) => "?number",
        Value::String(_) => "?string",
        Value::Array(_) => "?array<>",
        Value::Object(_) => "?object",
    };
    Value::from(tag)
}

fn is_field_path(value: &Value, context: Context) -> bool {
    context == Context::Expression && value.as_str().is_some_and(|s| s.starts_with('$'))
}

fn shape_filter(filter: &Value) -> Value {
    match filter {
        Value::Object(map) => Value::Object(shape_map(map, Context::Filter)),
        other => shape_value(other, Context::Filter),
    }
}

fn shape_map(map: &Map<String, Value>, context: Context) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            let shaped = match value {
                _ if key == EXPR => shape_value(value, Context::Expression),
                Value::Array(clauses)
                    if context == Context::Filter
                        && LOGICAL_OPERATORS.contains(&key.as_str()) =>
                {
                    Value::Array(clauses.iter().map(shape_filter).collect())
                }
                other => shape_value(other, context),
            };
            (key.clone(), shaped)
        })
        .collect()
}

fn shape_value(value: &Value, context: Context) -> Value {
    match value {
        Value::Object(map) => Value::Object(shape_map(map, context)),
        Value::Array(items) => shape_array(items, context),
        path if is_field_path(path, context) => path.clone(),
        literal => placeholder_for(literal),
    }
}

fn shape_array(items: &[Value], context: Context) -> Value {
    if items
        .iter()
        .any(|item| item.is_object() || item.is_array() || is_field_path(item, context))
    {
        return Value::Array(items.iter().map(|item| shape_value(item, context)).collect());
    }

    // Literal arrays collapse to one placeholder so `$in: [1]` and
    // `$in: [1, 2, 3]` share a shape.
    let mut tags: Vec<String> = items
        .iter()
        .map(|item| match placeholder_for(item) {
            Value::String(tag) => tag,
            other => other.to_string(),
        })
        .collect();
    tags.sort_unstable();
    tags.dedup();

    match tags.as_slice() {
        [single] => Value::from(format!("?array<{single}>")),
        _ => Value::from("?array<>"),
    }
}

fn shape_projection(projection: &Value) -> Value {
    let Some(map) = projection.as_object() else {
        return shape_value(projection, Context::Expression);
    };

    let shaped = map
        .iter()
        .map(|(field, spec)| {
            let spec = match spec {
                Value::Bool(include) => Value::Bool(*include),
                Value::Number(n) => {
                    Value::Bool(n.as_f64().is_some_and(|f| f.abs() > f64::EPSILON))
                }
                computed => shape_value(computed, Context::Expression),
            };
            (field.clone(), spec)
        })
        .collect();
    Value::Object(shaped)
}

fn shape_stage(stage: &Value) -> Value {
    let Some(map) = stage.as_object() else {
        return shape_value(stage, Context::Expression);
    };

    let shaped = map
        .iter()
        .map(|(name, arg)| {
            let arg = match name.as_str() {
                "$match" => shape_filter(arg),
                "$sort" => arg.clone(),
                "$project" => shape_projection(arg),
                n if NUMERIC_STAGES.contains(&n) => placeholder_for(arg),
                _ => shape_value(arg, Context::Expression),
            };
            (name.clone(), arg)
        })
        .collect();
    Value::Object(shaped)
}
