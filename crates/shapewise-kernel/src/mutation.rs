//! Mutations the kernel can apply and the transitions they produce.

use shapewise_types::{QuerySettings, QueryShapeConfiguration, ShapeKey};

/// A requested change to the entry list.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert the entry, or replace the one with the same shape key.
    Upsert(QueryShapeConfiguration),

    /// Drop the entry for a shape key, if any.
    Remove(ShapeKey),

    /// Replace only the settings of an existing entry.
    ///
    /// Namespace and representative query are kept. Used when the caller
    /// addresses a shape by its hash and has no query to record.
    UpdateSettings {
        key: ShapeKey,
        settings: QuerySettings,
    },
}

impl Mutation {
    /// Returns the shape key this mutation targets.
    pub fn key(&self) -> &ShapeKey {
        match self {
            Self::Upsert(entry) => &entry.shape_key,
            Self::Remove(key) | Self::UpdateSettings { key, .. } => key,
        }
    }
}

/// What a mutation did to the targeted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Inserted,
    Replaced,
    Removed,
    /// The key was absent, so nothing was removed.
    NotPresent,
}

/// The entry list a mutation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub entries: Vec<QueryShapeConfiguration>,
    pub change: Change,
}

impl Transition {
    /// Returns true if the entry list is unchanged and no swap is needed.
    pub fn is_noop(&self) -> bool {
        self.change == Change::NotPresent
    }
}
