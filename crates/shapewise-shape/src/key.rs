//! Shape key derivation.
//!
//! The normalized shape is fed to BLAKE3 through a canonical encoding:
//! every value is type-tagged and object fields are visited in sorted
//! order. The key therefore does not depend on how the JSON map happens
//! to be ordered in memory.

use blake3::Hasher;
use serde_json::Value;
use shapewise_types::{RepresentativeQuery, ShapeKey};

use crate::ShapeError;
use crate::normalize::query_shape;

/// BLAKE3 key-derivation context; changing it re-keys every stored entry.
pub const SHAPE_KEY_CONTEXT: &str = "shapewise 2025-01-01 query shape key v1";

/// Derives the shape key of a representative query.
///
/// # Errors
///
/// Returns a [`ShapeError`] if the query fails validation.
pub fn derive_shape_key(query: &RepresentativeQuery) -> Result<ShapeKey, ShapeError> {
    let shape = query_shape(query)?;
    Ok(shape_key_of(&shape))
}

/// Hashes an already-normalized shape.
pub fn shape_key_of(shape: &Value) -> ShapeKey {
    let mut hasher = Hasher::new_derive_key(SHAPE_KEY_CONTEXT);
    hash_canonical(&mut hasher, shape);
    ShapeKey::from_bytes(*hasher.finalize().as_bytes())
}

fn hash_canonical(hasher: &mut Hasher, value: &Value) {
    match value {
        Value::Null => {
            hasher.update(&[0u8]);
        }
        Value::Bool(b) => {
            hasher.update(&[1u8, u8::from(*b)]);
        }
        Value::Number(n) => {
            hasher.update(&[2u8]);
            hash_str(hasher, &n.to_string());
        }
        Value::String(s) => {
            hasher.update(&[3u8]);
            hash_str(hasher, s);
        }
        Value::Array(items) => {
            hasher.update(&[4u8]);
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                hash_canonical(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update(&[5u8]);
            hasher.update(&(map.len() as u64).to_le_bytes());
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_unstable_by(|a, b| a.0.cmp(b.0));
            for (name, field) in fields {
                hash_str(hasher, name);
                hash_canonical(hasher, field);
            }
        }
    }
}

// Length prefix keeps ("ab","c") and ("a","bc") apart.
fn hash_str(hasher: &mut Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}
