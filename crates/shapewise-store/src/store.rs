//! The authoritative configuration store.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use shapewise_types::{ConfigurationDocument, QueryShapeConfiguration, Version};
use tracing::{debug, info};

use crate::clock::LogicalClock;
use crate::persist::{load_document, save_document_if_unchanged};
use crate::versioned::VersionedDocument;
use crate::StoreError;

/// Exclusive owner of the cluster-wide [`ConfigurationDocument`].
///
/// Everything else holds snapshots (`Arc<ConfigurationDocument>`), each
/// carrying the version it was read at in its `version` field.
#[derive(Debug)]
pub struct ConfigurationStore {
    document: VersionedDocument<ConfigurationDocument>,
    clock: Arc<dyn LogicalClock>,
    /// Version of the on-disk document this store last loaded or saved.
    persisted: Mutex<Version>,
}

impl ConfigurationStore {
    /// Creates an empty store at version 0.
    pub fn new(clock: Arc<dyn LogicalClock>) -> Self {
        Self::from_document(ConfigurationDocument::new(), clock)
    }

    /// Creates a store resuming from a previously persisted document.
    ///
    /// Versions continue from the document's version, so a restarted store
    /// never hands out a version a member has already seen.
    pub fn from_document(document: ConfigurationDocument, clock: Arc<dyn LogicalClock>) -> Self {
        let version = document.version;
        Self {
            document: VersionedDocument::with_version(document, version),
            clock,
            persisted: Mutex::new(version),
        }
    }

    /// Opens the document persisted at `path`, or an empty one if absent.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn LogicalClock>) -> Result<Self, StoreError> {
        let document = load_document(path.as_ref())?;
        debug!(
            path = %path.as_ref().display(),
            version = %document.version,
            entries = document.len(),
            "opened configuration document"
        );
        Ok(Self::from_document(document, clock))
    }

    /// Persists the current snapshot to `path`.
    ///
    /// Fails with [`StoreError::VersionConflict`] if another store saved to
    /// `path` since this one opened or last saved it; the file is left as
    /// the other writer left it.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let mut persisted = self.persisted.lock().unwrap_or_else(PoisonError::into_inner);
        let document = self.read();
        save_document_if_unchanged(path.as_ref(), &document, *persisted)?;
        *persisted = document.version;
        Ok(())
    }

    /// Version of the on-disk document as of the last load or save.
    pub fn persisted_version(&self) -> Version {
        *self.persisted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a consistent snapshot of the document.
    pub fn read(&self) -> Arc<ConfigurationDocument> {
        let snapshot = self.document.read();
        debug_assert_eq!(snapshot.version(), snapshot.value().version);
        snapshot.into_value()
    }

    pub fn version(&self) -> Version {
        self.document.version()
    }

    /// Replaces the entry list iff the document is still at `expected`.
    ///
    /// On success the document is stamped with `expected + 1` and a cluster
    /// time strictly after the previous one. On a version mismatch the
    /// store is left untouched and [`StoreError::VersionConflict`] is
    /// returned.
    pub fn compare_and_swap(
        &self,
        expected: Version,
        entries: Vec<QueryShapeConfiguration>,
    ) -> Result<Arc<ConfigurationDocument>, StoreError> {
        let clock = &self.clock;
        let snapshot = self
            .document
            .compare_and_swap_with(expected, |current, version| ConfigurationDocument {
                entries,
                version,
                cluster_time: clock.tick().max(current.cluster_time.successor()),
            })
            .inspect_err(|e| debug!(error = %e, "compare-and-swap rejected"))?;

        let document = snapshot.into_value();
        debug!(
            version = %document.version,
            cluster_time = %document.cluster_time,
            entries = document.len(),
            "compare-and-swap accepted"
        );
        Ok(document)
    }

    /// Clears every entry regardless of the current version.
    ///
    /// The version still advances, keeping it monotonic for members that
    /// already observed the cleared document's predecessors.
    pub fn reset(&self) -> Arc<ConfigurationDocument> {
        let clock = &self.clock;
        let snapshot = self
            .document
            .force_replace_with(|current, version| ConfigurationDocument {
                entries: Vec::new(),
                version,
                cluster_time: clock.tick().max(current.cluster_time.successor()),
            });

        let document = snapshot.into_value();
        info!(version = %document.version, "configuration document reset");
        document
    }
}
