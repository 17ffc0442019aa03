//! Extension point between a command's read and its swap.
//!
//! Production wires in [`NoopHook`]. Tests install [`PauseAfterRead`] to hold
//! a chosen command after it has read the configuration, commit a competing
//! command, then release the held one and observe its conflict.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use shapewise_types::{RepresentativeQuery, ShapeKey, Version};
use tracing::{debug, warn};

/// Name under which [`PauseAfterRead`] is known to operators and tests.
pub const PAUSE_AFTER_READ: &str = "pauseAfterReadingQuerySettingsConfigurationParameter";

/// Default bound on how long a command may be held.
pub const DEFAULT_PAUSE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Set,
    Remove,
}

/// A command that has read the configuration and has not swapped yet.
#[derive(Debug, Clone, Copy)]
pub struct PendingCommand<'a> {
    pub kind: CommandKind,
    pub shape_key: ShapeKey,
    /// Absent for hash-addressed commands.
    pub representative_query: Option<&'a RepresentativeQuery>,
    pub read_version: Version,
}

/// Invoked by the command processor after reading and before swapping.
pub trait ModificationHook: Send + Sync {
    fn after_read(&self, command: &PendingCommand<'_>);
}

/// The production hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl ModificationHook for NoopHook {
    fn after_read(&self, _command: &PendingCommand<'_>) {}
}

type Predicate = Arc<dyn Fn(&PendingCommand<'_>) -> bool + Send + Sync>;

#[derive(Default)]
struct PauseState {
    predicate: Option<Predicate>,
    times_entered: u64,
    /// Bumped on every disable; held commands wait for it to move.
    generation: u64,
}

/// Holds matching commands after their read until disabled or timed out.
pub struct PauseAfterRead {
    state: Mutex<PauseState>,
    changed: Condvar,
    timeout: Duration,
}

impl PauseAfterRead {
    /// Creates a disabled fail point whose held commands give up waiting
    /// after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Mutex::new(PauseState::default()),
            changed: Condvar::new(),
            timeout,
        }
    }

    pub fn name(&self) -> &'static str {
        PAUSE_AFTER_READ
    }

    /// Holds commands whose representative query equals `query`.
    ///
    /// Queries sharing a shape but differing in literals are not held.
    pub fn enable(&self, representative_query_to_block: RepresentativeQuery) {
        self.enable_when(move |cmd| cmd.representative_query == Some(&representative_query_to_block));
    }

    /// Holds commands matching an arbitrary predicate.
    pub fn enable_when<F>(&self, predicate: F)
    where
        F: Fn(&PendingCommand<'_>) -> bool + Send + Sync + 'static,
    {
        let mut state = self.lock();
        state.predicate = Some(Arc::new(predicate));
        state.times_entered = 0;
        debug!(fail_point = PAUSE_AFTER_READ, "fail point enabled");
    }

    /// Disarms the fail point and releases every held command.
    pub fn disable(&self) {
        let mut state = self.lock();
        state.predicate = None;
        state.generation += 1;
        self.changed.notify_all();
        debug!(fail_point = PAUSE_AFTER_READ, "fail point disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().predicate.is_some()
    }

    /// Number of commands held since the last enable.
    pub fn times_entered(&self) -> u64 {
        self.lock().times_entered
    }

    /// Blocks until at least `times` commands have been held since the last
    /// enable, or `timeout` elapses. Returns true if the count was reached.
    pub fn wait_for_hit(&self, times: u64, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .changed
            .wait_timeout_while(state, timeout, |s| s.times_entered < times)
            .unwrap_or_else(PoisonError::into_inner);
        state.times_entered >= times
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PauseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PauseAfterRead {
    fn default() -> Self {
        Self::new(DEFAULT_PAUSE_TIMEOUT)
    }
}

impl ModificationHook for PauseAfterRead {
    fn after_read(&self, command: &PendingCommand<'_>) {
        let mut state = self.lock();
        let held = state
            .predicate
            .as_ref()
            .is_some_and(|predicate| predicate(command));
        if !held {
            return;
        }

        state.times_entered += 1;
        let generation = state.generation;
        self.changed.notify_all();
        debug!(
            fail_point = PAUSE_AFTER_READ,
            shape = %command.shape_key,
            read_version = %command.read_version,
            "holding command after read"
        );

        let (_state, wait) = self
            .changed
            .wait_timeout_while(state, self.timeout, |s| s.generation == generation)
            .unwrap_or_else(PoisonError::into_inner);

        if wait.timed_out() {
            warn!(
                fail_point = PAUSE_AFTER_READ,
                shape = %command.shape_key,
                timeout_ms = self.timeout.as_millis() as u64,
                "fail point timed out, releasing command"
            );
        }
    }
}

impl fmt::Debug for PauseAfterRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PauseAfterRead")
            .field("enabled", &self.is_enabled())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
