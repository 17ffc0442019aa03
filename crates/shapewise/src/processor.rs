//! The read → compute → swap cycle behind every query settings command.
//!
//! ```text
//!   validate ──► read (v) ──► hook ──► compute ──► cas(v) ──► publish
//!      │                                             │
//!      └─► InvalidArgument                           └─► ConflictingOperationInProgress
//! ```
//!
//! Each invocation is independent; the processor keeps no state between
//! calls and never retries. A command that loses the swap has no effect.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use shapewise_kernel::{Change, Mutation, Transition, apply_mutation, validate_settings};
use shapewise_propagate::Propagator;
use shapewise_shape::{derive_shape_key, query_shape};
use shapewise_store::{ConfigurationStore, StoreError};
use shapewise_types::{
    ConfigurationDocument, Namespace, QuerySettings, QueryShapeConfiguration,
    RepresentativeQuery, ShapeKey,
};
use tracing::{debug, info, warn};

use crate::error::{Result, ShapewiseError};
use crate::failpoint::{CommandKind, ModificationHook, NoopHook, PendingCommand};

/// What a committed (or skipped) command did.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub shape_key: ShapeKey,
    pub change: Change,
    /// The document after the command. For a no-op this is the snapshot
    /// the command read.
    pub document: Arc<ConfigurationDocument>,
}

impl CommandOutcome {
    /// Returns true if the command swapped the document.
    pub fn committed(&self) -> bool {
        self.change != Change::NotPresent
    }
}

/// One row of the settings listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySettingsEntry {
    pub query_shape_hash: ShapeKey,
    pub namespace: Namespace,
    pub settings: QuerySettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representative_query: Option<RepresentativeQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_query_shape: Option<Value>,
}

/// Executes query settings commands against a [`ConfigurationStore`].
pub struct CommandProcessor {
    store: Arc<ConfigurationStore>,
    propagator: Option<Propagator>,
    hook: Arc<dyn ModificationHook>,
}

impl CommandProcessor {
    /// Creates a processor with no propagation and the no-op hook.
    pub fn new(store: Arc<ConfigurationStore>) -> Self {
        Self {
            store,
            propagator: None,
            hook: Arc::new(NoopHook),
        }
    }

    /// Publishes every committed document through `propagator`.
    pub fn with_propagator(mut self, propagator: Propagator) -> Self {
        self.propagator = Some(propagator);
        self
    }

    /// Installs a hook invoked between read and swap.
    pub fn with_hook(mut self, hook: Arc<dyn ModificationHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn store(&self) -> &Arc<ConfigurationStore> {
        &self.store
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Sets the settings for the shape of `query`, replacing existing ones.
    ///
    /// Setting identical settings still swaps and advances the version.
    pub fn set_query_settings(
        &self,
        query: &RepresentativeQuery,
        settings: QuerySettings,
    ) -> Result<CommandOutcome> {
        let shape_key = derive_shape_key(query)?;
        validate_settings(&settings)?;

        let entry = QueryShapeConfiguration::new(shape_key, query.namespace().clone(), settings)
            .with_representative_query(query.clone());

        self.run(
            CommandKind::Set,
            shape_key,
            Some(query),
            Mutation::Upsert(entry),
        )
    }

    /// Replaces the settings of an existing entry addressed by shape hash.
    ///
    /// Returns [`ShapewiseError::NotFound`] if no entry has that hash; a new
    /// entry needs a representative query.
    pub fn set_query_settings_by_hash(
        &self,
        shape_key: ShapeKey,
        settings: QuerySettings,
    ) -> Result<CommandOutcome> {
        validate_settings(&settings)?;
        self.run(
            CommandKind::Set,
            shape_key,
            None,
            Mutation::UpdateSettings {
                key: shape_key,
                settings,
            },
        )
    }

    /// Removes the settings for the shape of `query`.
    ///
    /// Removing settings that do not exist succeeds without a swap.
    pub fn remove_query_settings(&self, query: &RepresentativeQuery) -> Result<CommandOutcome> {
        let shape_key = derive_shape_key(query)?;
        self.run(
            CommandKind::Remove,
            shape_key,
            Some(query),
            Mutation::Remove(shape_key),
        )
    }

    /// Removes the settings for a shape hash.
    pub fn remove_query_settings_by_hash(&self, shape_key: ShapeKey) -> Result<CommandOutcome> {
        self.run(
            CommandKind::Remove,
            shape_key,
            None,
            Mutation::Remove(shape_key),
        )
    }

    /// Clears every entry unconditionally.
    ///
    /// Not subject to conflict detection; the version still advances.
    pub fn remove_all_query_settings(&self) -> Arc<ConfigurationDocument> {
        let document = self.store.reset();
        self.publish(&document);
        document
    }

    fn run(
        &self,
        kind: CommandKind,
        shape_key: ShapeKey,
        query: Option<&RepresentativeQuery>,
        mutation: Mutation,
    ) -> Result<CommandOutcome> {
        // Read
        let snapshot = self.store.read();
        let read_version = snapshot.version;
        debug!(?kind, shape = %shape_key, %read_version, "read configuration");

        self.hook.after_read(&PendingCommand {
            kind,
            shape_key,
            representative_query: query,
            read_version,
        });

        // Compute
        let Transition { entries, change } = apply_mutation(&snapshot.entries, mutation)?;
        if change == Change::NotPresent {
            debug!(?kind, shape = %shape_key, "no settings to remove, skipping swap");
            return Ok(CommandOutcome {
                shape_key,
                change,
                document: snapshot,
            });
        }

        // Swap
        let document = self
            .store
            .compare_and_swap(read_version, entries)
            .map_err(|e| {
                if let StoreError::VersionConflict { expected, actual } = &e {
                    warn!(
                        ?kind,
                        shape = %shape_key,
                        %expected,
                        %actual,
                        "lost configuration update race"
                    );
                }
                ShapewiseError::from(e)
            })?;

        // Postcondition: version advanced by exactly one
        debug_assert_eq!(document.version, read_version.next());

        info!(
            ?kind,
            ?change,
            shape = %shape_key,
            version = %document.version,
            cluster_time = %document.cluster_time,
            entries = document.len(),
            "committed query settings"
        );
        self.publish(&document);

        Ok(CommandOutcome {
            shape_key,
            change,
            document,
        })
    }

    fn publish(&self, document: &Arc<ConfigurationDocument>) {
        if let Some(propagator) = &self.propagator {
            propagator.publish(Arc::clone(document));
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Lists every entry, optionally with its normalized query shape.
    pub fn query_settings(&self, with_debug_shape: bool) -> Result<Vec<QuerySettingsEntry>> {
        let snapshot = self.store.read();
        snapshot
            .entries
            .iter()
            .map(|entry| -> Result<QuerySettingsEntry> {
                let debug_query_shape = match (&entry.representative_query, with_debug_shape) {
                    (Some(query), true) => Some(query_shape(query)?),
                    _ => None,
                };
                Ok(QuerySettingsEntry {
                    query_shape_hash: entry.shape_key,
                    namespace: entry.namespace.clone(),
                    settings: entry.settings.clone(),
                    representative_query: entry.representative_query.clone(),
                    debug_query_shape,
                })
            })
            .collect()
    }

    /// Returns the settings that apply to `query`, if any.
    pub fn settings_for(&self, query: &RepresentativeQuery) -> Result<Option<QuerySettings>> {
        let shape_key = derive_shape_key(query)?;
        Ok(self
            .store
            .read()
            .get(&shape_key)
            .map(|entry| entry.settings.clone()))
    }
}

impl std::fmt::Debug for CommandProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProcessor")
            .field("version", &self.store.version())
            .field("propagating", &self.propagator.is_some())
            .finish_non_exhaustive()
    }
}
