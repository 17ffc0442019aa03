//! # Shapewise
//!
//! Cluster-wide query settings that cannot lose updates.
//!
//! A single configuration document maps query shapes to settings. Every
//! command reads the document, computes the next entry list, and offers it
//! back with a compare-and-swap on the document version. When two commands
//! race from the same version exactly one wins; the other fails with
//! `ConflictingOperationInProgress` and has no effect.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Shapewise                             │
//! │  ┌───────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐  │
//! │  │   Shape   │ → │  Kernel  │ → │  Store   │ → │  Propagator  │  │
//! │  │ (key)     │   │(pure fn) │   │  (CAS)   │   │  (members)   │  │
//! │  └───────────┘   └──────────┘   └──────────┘   └──────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use serde_json::json;
//! use shapewise::{Namespace, QuerySettings, RepresentativeQuery, Shapewise, ShapewiseOptions};
//!
//! let db = Shapewise::in_memory(&ShapewiseOptions::default());
//! let query = RepresentativeQuery::find(Namespace::new("shop", "orders"), json!({"status": "open"}));
//! let settings = QuerySettings::new(json!({"indexHints": {"allowedIndexes": ["status_1"]}}));
//!
//! let outcome = db.processor().set_query_settings(&query, settings.clone()).unwrap();
//! assert_eq!(outcome.document.version.as_u64(), 1);
//!
//! // Any literal with the same shape picks up the settings.
//! let other = RepresentativeQuery::find(Namespace::new("shop", "orders"), json!({"status": "closed"}));
//! assert_eq!(db.processor().settings_for(&other).unwrap(), Some(settings));
//! ```

mod error;
pub mod failpoint;
mod processor;
mod shapewise;

pub use error::{ErrorCode, Result, ShapewiseError};
pub use failpoint::{
    CommandKind, ModificationHook, NoopHook, PAUSE_AFTER_READ, PauseAfterRead, PendingCommand,
};
pub use processor::{CommandOutcome, CommandProcessor, QuerySettingsEntry};
pub use shapewise::{Shapewise, ShapewiseOptions};

// Re-export core types
pub use shapewise_types::{
    ClusterTime, ConfigurationDocument, Namespace, QuerySettings, QueryShapeConfiguration,
    RepresentativeQuery, ShapeKey, Version,
};

// Re-export the building blocks for advanced usage
pub use shapewise_kernel::Change;
pub use shapewise_propagate::{Member, MemberCache, MemberId, Propagator, ReadSession};
pub use shapewise_shape::{derive_shape_key, query_shape};
pub use shapewise_store::{ConfigurationStore, LogicalClock, ManualClock, SystemLogicalClock};
