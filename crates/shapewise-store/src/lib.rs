//! # shapewise-store: Versioned configuration storage
//!
//! The store owns the single authoritative [`ConfigurationDocument`] and
//! exposes exactly two ways to touch it:
//!
//! - [`ConfigurationStore::read`] returns an immutable snapshot tagged with
//!   the version it was read at
//! - [`ConfigurationStore::compare_and_swap`] replaces the whole entry list
//!   iff the version has not moved since the caller's read
//!
//! ```text
//!   writer A ── read v7 ──────────────── cas(v7) ──► Ok(v8)
//!   writer B ── read v7 ── cas(v7) ──► Ok(v8)?  ✗   Conflict { expected: 7, actual: 8 }
//! ```
//!
//! The swap is a single global compare-and-swap over the entire document,
//! not per entry: two writers touching unrelated shapes still conflict if
//! they raced from the same version. At most one writer wins per version
//! and the loser's write is discarded, never merged.
//!
//! ## Modules
//!
//! - [`versioned`]: generic [`VersionedDocument`] cell (snapshot + CAS)
//! - [`clock`]: injected logical clocks for the document's cluster time
//! - [`store`]: [`ConfigurationStore`] over the configuration document
//! - [`persist`]: JSON save/load with atomic replacement and a
//!   lock-guarded conditional save for files shared between processes

pub mod clock;
pub mod persist;
pub mod store;
pub mod versioned;

pub use clock::{LogicalClock, ManualClock, SystemLogicalClock};
pub use persist::{DocumentLock, load_document, save_document, save_document_if_unchanged};
pub use store::ConfigurationStore;
pub use versioned::{Snapshot, VersionedDocument};

use std::path::PathBuf;

use shapewise_types::Version;

#[doc(no_inline)]
pub use shapewise_types::ConfigurationDocument;

/// Errors raised by the store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The document moved on since the caller read it.
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: Version, actual: Version },

    /// Reading or writing the persisted document failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The persisted document is not valid JSON of the expected shape.
    #[error("failed to decode configuration document at {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The document could not be encoded for saving.
    #[error("failed to encode configuration document for {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The persisted document violates a document invariant.
    #[error("corrupt configuration document at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl StoreError {
    /// Returns true for a lost compare-and-swap race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
