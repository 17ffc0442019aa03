//! Logical clocks for the configuration document's cluster time.
//!
//! The store does not own a clock. One is injected at construction so
//! production can use wall-clock-derived ticks while tests drive time by
//! hand. The store additionally clamps every tick to strictly exceed the
//! previous document's time, so a clock that stalls or runs backwards
//! cannot make cluster time regress.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use shapewise_types::ClusterTime;

/// Source of logical timestamps.
pub trait LogicalClock: Send + Sync + Debug {
    /// Returns a timestamp not smaller than any previously returned one.
    fn tick(&self) -> ClusterTime;
}

impl<C: LogicalClock + ?Sized> LogicalClock for Arc<C> {
    fn tick(&self) -> ClusterTime {
        (**self).tick()
    }
}

/// Nanoseconds since the Unix epoch, forced strictly increasing.
///
/// Equivalent to `max(now, last + 1ns)` on every tick.
#[derive(Debug, Default)]
pub struct SystemLogicalClock {
    last: AtomicU64,
}

impl SystemLogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_nanos() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

impl LogicalClock for SystemLogicalClock {
    fn tick(&self) -> ClusterTime {
        let now = Self::now_nanos();
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        ClusterTime::new(now.max(previous.saturating_add(1)))
    }
}

/// A counter-driven clock for tests and simulations.
///
/// Each tick returns the next integer; [`ManualClock::advance_to`] jumps
/// forward.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock whose next tick is `start + 1`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Moves the clock forward. Moving backwards is ignored.
    pub fn advance_to(&self, ticks: u64) {
        self.now.fetch_max(ticks, Ordering::AcqRel);
    }

    /// Returns the last value handed out, without ticking.
    pub fn peek(&self) -> ClusterTime {
        ClusterTime::new(self.now.load(Ordering::Acquire))
    }
}

impl LogicalClock for ManualClock {
    fn tick(&self) -> ClusterTime {
        ClusterTime::new(self.now.fetch_add(1, Ordering::AcqRel) + 1)
    }
}
