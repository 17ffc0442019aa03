//! # shapewise-kernel: Pure entry-list transitions
//!
//! The kernel computes the next entry list of the configuration document
//! from the current one and a requested [`Mutation`]. It never reads or
//! writes the store; the caller reads a snapshot, asks the kernel for the
//! transition, then offers the result to the store's compare-and-swap.
//!
//! ## Key Principles
//!
//! - **No IO**: the kernel only sees the slice it is handed
//! - **No clocks**: versions and cluster time are stamped by the store
//! - **Unique keys**: every produced list holds at most one entry per shape key
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use shapewise_kernel::{Change, Mutation, apply_mutation};
//! use shapewise_types::{Namespace, QuerySettings, QueryShapeConfiguration, ShapeKey};
//!
//! let entry = QueryShapeConfiguration::new(
//!     ShapeKey::from_bytes([1; 32]),
//!     Namespace::new("db", "c"),
//!     QuerySettings::new(json!({"queryFramework": "sbe"})),
//! );
//!
//! let transition = apply_mutation(&[], Mutation::Upsert(entry)).unwrap();
//! assert_eq!(transition.change, Change::Inserted);
//! assert_eq!(transition.entries.len(), 1);
//! ```

pub mod kernel;
pub mod mutation;


pub use kernel::{KernelError, apply_mutation, validate_settings};
pub use mutation::{Change, Mutation, Transition};
