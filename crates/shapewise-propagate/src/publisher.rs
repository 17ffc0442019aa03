//! Broadcasting committed documents to members.

use std::sync::Arc;

use shapewise_types::ConfigurationDocument;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Receiving end handed to a member.
pub type Subscription = broadcast::Receiver<Arc<ConfigurationDocument>>;

/// Publishes committed configuration documents to subscribed members.
///
/// Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct Propagator {
    tx: broadcast::Sender<Arc<ConfigurationDocument>>,
    capacity: usize,
}

impl Propagator {
    /// Creates a propagator buffering up to `capacity` documents per slow
    /// member. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            warn!("propagation channel capacity 0 raised to 1");
        }
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sends a committed document to all members.
    ///
    /// Returns the number of members it was queued for. Members that fall
    /// more than `capacity` documents behind see `RecvError::Lagged` and
    /// catch up by pulling.
    pub fn publish(&self, document: Arc<ConfigurationDocument>) -> usize {
        let version = document.version;
        let cluster_time = document.cluster_time;
        let delivered = self.tx.send(document).unwrap_or_default();
        debug!(%version, %cluster_time, delivered, "published configuration document");
        delivered
    }

    /// Subscribes to documents published from now on.
    pub fn subscribe(&self) -> Subscription {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Propagator {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
