//! Turning command-line flags into representative queries.

use clap::Args;
use serde_json::Value;
use shapewise::{Namespace, RepresentativeQuery, ShapeKey, ShapewiseError};

/// Flags describing a representative query.
///
/// `--filter` alone is a `find`; `--pipeline` an `aggregate`; `--distinct`
/// a `distinct` whose query is `--filter`.
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Namespace as db.coll.
    #[arg(long = "ns")]
    pub namespace: Option<String>,

    /// Filter as a JSON object.
    #[arg(long)]
    pub filter: Option<String>,

    /// Sort spec as a JSON object (find only).
    #[arg(long)]
    pub sort: Option<String>,

    /// Projection as a JSON object (find only).
    #[arg(long)]
    pub projection: Option<String>,

    /// Aggregation pipeline as a JSON array.
    #[arg(long, conflicts_with_all = ["filter", "sort", "projection", "distinct"])]
    pub pipeline: Option<String>,

    /// Field path for a distinct.
    #[arg(long, conflicts_with_all = ["sort", "projection"])]
    pub distinct: Option<String>,
}

/// What a set or remove addresses.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Query(RepresentativeQuery),
    Hash(ShapeKey),
}

impl QueryArgs {
    /// Builds the representative query the flags describe.
    pub fn to_query(&self) -> Result<RepresentativeQuery, ShapewiseError> {
        let namespace: Namespace = self
            .namespace
            .as_deref()
            .ok_or_else(|| ShapewiseError::invalid_argument("--ns is required"))?
            .parse::<Namespace>()
            .map_err(|e| ShapewiseError::invalid_argument(e.to_string()))?;

        if let Some(pipeline) = &self.pipeline {
            let stages = match parse_json("--pipeline", pipeline)? {
                Value::Array(stages) => stages,
                _ => {
                    return Err(ShapewiseError::invalid_argument(
                        "--pipeline must be a JSON array",
                    ));
                }
            };
            return Ok(RepresentativeQuery::aggregate(namespace, stages));
        }

        let filter = self
            .filter
            .as_deref()
            .map(|text| parse_json("--filter", text))
            .transpose()?;

        if let Some(key) = &self.distinct {
            return Ok(RepresentativeQuery::distinct(namespace, key, filter));
        }

        let mut query = RepresentativeQuery::find(
            namespace,
            filter.unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        );
        if let Some(sort) = &self.sort {
            query = query.with_sort(parse_json("--sort", sort)?);
        }
        if let Some(projection) = &self.projection {
            query = query.with_projection(parse_json("--projection", projection)?);
        }
        Ok(query)
    }

    /// Resolves the flags together with an optional `--hash`.
    pub fn target(&self, hash: Option<&str>) -> Result<Target, ShapewiseError> {
        match hash {
            Some(hex) => hex
                .parse()
                .map(Target::Hash)
                .map_err(|e| ShapewiseError::invalid_argument(e.to_string())),
            None => self.to_query().map(Target::Query),
        }
    }
}

/// Parses a flag value as JSON, reporting failures as invalid arguments.
pub fn parse_json(flag: &str, text: &str) -> Result<Value, ShapewiseError> {
    serde_json::from_str(text)
        .map_err(|e| ShapewiseError::invalid_argument(format!("{flag} is not valid JSON: {e}")))
}
