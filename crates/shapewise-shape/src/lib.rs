//! # shapewise-shape: Query shapes and shape keys
//!
//! A query's *shape* is the query with every literal replaced by a type
//! placeholder. Field paths, operators and logical nesting survive; values
//! do not. Queries with the same shape on the same namespace share one
//! [`ShapeKey`], which is how settings are addressed.
//!
//! ```text
//! {a: 1}            ─┐
//! {a: 2}            ─┼─► {a: "?number"} ──► BLAKE3 ──► ShapeKey
//! {a: 1234}         ─┘
//! {b: "string"}     ───► {b: "?string"} ──► BLAKE3 ──► (different) ShapeKey
//! ```
//!
//! Derivation is a pure function of the representative query: no hidden
//! state, no randomness, no dependency on JSON map ordering.
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use shapewise_shape::derive_shape_key;
//! use shapewise_types::{Namespace, RepresentativeQuery};
//!
//! let ns = Namespace::new("test", "orders");
//! let a1 = RepresentativeQuery::find(ns.clone(), json!({"a": 1}));
//! let a2 = RepresentativeQuery::find(ns, json!({"a": 2}));
//!
//! assert_eq!(derive_shape_key(&a1).unwrap(), derive_shape_key(&a2).unwrap());
//! ```

mod key;
mod normalize;
mod validate;


pub use key::{SHAPE_KEY_CONTEXT, derive_shape_key, shape_key_of};
pub use normalize::{placeholder_for, query_shape};
pub use validate::validate_query;

use shapewise_types::ShapeKey;

/// Errors raised for malformed representative queries.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// The database part of the namespace is empty.
    #[error("database name must not be empty")]
    EmptyDatabase,

    /// The collection part of the namespace is empty.
    #[error("collection name must not be empty")]
    EmptyCollection,

    /// Settings cannot target a server-internal database.
    #[error("query settings cannot be applied to queries on internal database '{0}'")]
    InternalNamespace(String),

    /// A field that must be a JSON object was something else.
    #[error("'{0}' must be an object")]
    NotAnObject(&'static str),

    /// A sort direction was neither 1, -1 nor a `$meta` object.
    #[error("invalid sort direction for field '{0}'")]
    InvalidSort(String),

    /// An aggregation stage was not a single-field `$stage` object.
    #[error("pipeline stage {0} must be an object with exactly one '$'-prefixed field")]
    InvalidStage(usize),

    /// A `distinct` had no key.
    #[error("distinct key must not be empty")]
    EmptyDistinctKey,
}

/// Derives the key and the debug shape in one pass.
///
/// Useful for listings that show the normalized shape next to its key.
pub fn shape_with_key(
    query: &shapewise_types::RepresentativeQuery,
) -> Result<(ShapeKey, serde_json::Value), ShapeError> {
    let shape = query_shape(query)?;
    Ok((shape_key_of(&shape), shape))
}
