//! Main entry point wiring the store, processor and members together.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use shapewise_propagate::{
    DEFAULT_CHANNEL_CAPACITY, Member, MemberCache, MemberId, Propagator, ReadSession,
};
use shapewise_store::{ConfigurationStore, LogicalClock, SystemLogicalClock};
use shapewise_types::Version;
use tracing::debug;

use crate::error::Result;
use crate::failpoint::{DEFAULT_PAUSE_TIMEOUT, PauseAfterRead};
use crate::processor::CommandProcessor;

/// Options for assembling a [`Shapewise`] instance.
#[derive(Debug, Clone)]
pub struct ShapewiseOptions {
    /// Documents buffered per slow member before it must pull.
    pub channel_capacity: usize,
    /// Number of in-process members kept in sync.
    pub members: u32,
    /// Installs the [`PauseAfterRead`] fail point. Off in production.
    pub fail_points: bool,
    /// Bound on how long the fail point holds a command.
    pub pause_timeout: Duration,
}

impl Default for ShapewiseOptions {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            members: 3,
            fail_points: false,
            pause_timeout: DEFAULT_PAUSE_TIMEOUT,
        }
    }
}

impl ShapewiseOptions {
    pub fn with_members(mut self, members: u32) -> Self {
        self.members = members;
        self
    }

    pub fn with_fail_points(mut self, timeout: Duration) -> Self {
        self.fail_points = true;
        self.pause_timeout = timeout;
        self
    }
}

/// A configuration store, its command processor and the members that
/// receive every committed document.
pub struct Shapewise {
    store: Arc<ConfigurationStore>,
    processor: CommandProcessor,
    propagator: Propagator,
    fail_point: Option<Arc<PauseAfterRead>>,
    members: Mutex<Vec<Member>>,
}

impl Shapewise {
    pub fn new(store: Arc<ConfigurationStore>, options: &ShapewiseOptions) -> Self {
        let propagator = Propagator::new(options.channel_capacity);
        let current = store.read();

        let members = (0..options.members)
            .map(|id| {
                let cache = MemberCache::with_document(MemberId::new(id), Arc::clone(&current));
                Member::new(Arc::new(cache), propagator.subscribe())
            })
            .collect();

        let mut processor =
            CommandProcessor::new(Arc::clone(&store)).with_propagator(propagator.clone());
        let fail_point = options
            .fail_points
            .then(|| Arc::new(PauseAfterRead::new(options.pause_timeout)));
        if let Some(fail_point) = &fail_point {
            processor = processor.with_hook(Arc::clone(fail_point) as _);
        }

        debug!(
            members = options.members,
            capacity = options.channel_capacity,
            fail_points = options.fail_points,
            version = %current.version,
            "assembled shapewise"
        );

        Self {
            store,
            processor,
            propagator,
            fail_point,
            members: Mutex::new(members),
        }
    }

    /// Creates an empty, unpersisted instance.
    pub fn in_memory(options: &ShapewiseOptions) -> Self {
        Self::with_clock(Arc::new(SystemLogicalClock::new()), options)
    }

    pub fn with_clock(clock: Arc<dyn LogicalClock>, options: &ShapewiseOptions) -> Self {
        Self::new(Arc::new(ConfigurationStore::new(clock)), options)
    }

    /// Opens the document persisted at `path`, or starts empty.
    pub fn open(path: impl AsRef<Path>, options: &ShapewiseOptions) -> Result<Self> {
        let store = ConfigurationStore::open(path, Arc::new(SystemLogicalClock::new()))?;
        Ok(Self::new(Arc::new(store), options))
    }

    /// Persists the current document to `path`.
    ///
    /// Another process that saved to the same file since this instance
    /// opened it makes this fail with `ConflictingOperationInProgress`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        Ok(self.store.save(path)?)
    }

    pub fn processor(&self) -> &CommandProcessor {
        &self.processor
    }

    pub fn store(&self) -> &Arc<ConfigurationStore> {
        &self.store
    }

    pub fn propagator(&self) -> &Propagator {
        &self.propagator
    }

    /// The pause fail point, if enabled in the options.
    pub fn fail_point(&self) -> Option<&Arc<PauseAfterRead>> {
        self.fail_point.as_ref()
    }

    /// Delivers every published document to every member without waiting.
    ///
    /// Returns each member's cached version afterwards.
    pub fn sync_members(&self) -> Vec<(MemberId, Version)> {
        let mut members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        members
            .iter_mut()
            .map(|member| {
                member.catch_up(&*self.store);
                (member.cache().id(), member.cache().version())
            })
            .collect()
    }

    /// Opens a monotonic read session on one member.
    pub fn session(&self, member: MemberId) -> Option<ReadSession> {
        let members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        members
            .iter()
            .find(|m| m.cache().id() == member)
            .map(|m| ReadSession::new(Arc::clone(m.cache()), Arc::clone(&self.store) as _))
    }
}

impl std::fmt::Debug for Shapewise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shapewise")
            .field("version", &self.store.version())
            .field("fail_point", &self.fail_point)
            .finish_non_exhaustive()
    }
}
