//! Per-member cached copies of the configuration document.

use std::fmt::{self, Display};
use std::sync::{Arc, PoisonError, RwLock};

use shapewise_types::{ConfigurationDocument, Version};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::publisher::Subscription;
use crate::source::ConfigurationSource;

/// Identifies a cluster member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(u32);

impl MemberId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member-{}", self.0)
    }
}

impl From<u32> for MemberId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A member's local copy of the configuration document.
///
/// The cached version never decreases: [`apply`](Self::apply) ignores any
/// document that is not strictly newer.
#[derive(Debug)]
pub struct MemberCache {
    id: MemberId,
    current: RwLock<Arc<ConfigurationDocument>>,
}

impl MemberCache {
    /// Creates a cache holding the empty document at version 0.
    pub fn new(id: MemberId) -> Self {
        Self::with_document(id, Arc::new(ConfigurationDocument::new()))
    }

    pub fn with_document(id: MemberId, document: Arc<ConfigurationDocument>) -> Self {
        Self {
            id,
            current: RwLock::new(document),
        }
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Returns the cached document.
    pub fn snapshot(&self) -> Arc<ConfigurationDocument> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn version(&self) -> Version {
        self.snapshot().version
    }

    /// Installs `document` if it is newer than the cached one.
    ///
    /// Returns true if the cache changed.
    pub fn apply(&self, document: Arc<ConfigurationDocument>) -> bool {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if document.version <= current.version {
            debug!(
                member = %self.id,
                cached = %current.version,
                incoming = %document.version,
                "ignoring stale configuration document"
            );
            return false;
        }

        debug!(
            member = %self.id,
            from = %current.version,
            to = %document.version,
            "applied configuration document"
        );
        *current = document;
        true
    }

    /// Pulls the authoritative document and applies it.
    pub fn refresh(&self, source: &dyn ConfigurationSource) -> bool {
        self.apply(source.fetch())
    }
}

/// A member: its cache plus its subscription to the propagator.
#[derive(Debug)]
pub struct Member {
    cache: Arc<MemberCache>,
    subscription: Subscription,
}

impl Member {
    pub fn new(cache: Arc<MemberCache>, subscription: Subscription) -> Self {
        Self {
            cache,
            subscription,
        }
    }

    pub fn cache(&self) -> &Arc<MemberCache> {
        &self.cache
    }

    /// Applies every document already queued for this member, without
    /// waiting.
    ///
    /// Returns the number of documents that changed the cache. A member
    /// that lagged behind the channel's buffer pulls from `source`.
    pub fn catch_up(&mut self, source: &dyn ConfigurationSource) -> usize {
        let mut applied = 0;
        loop {
            match self.subscription.try_recv() {
                Ok(document) => {
                    applied += usize::from(self.cache.apply(document));
                }
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(member = %self.cache.id(), missed, "member lagged behind propagation, pulling");
                    applied += usize::from(self.cache.refresh(source));
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return applied,
            }
        }
    }

    /// Feeds published documents into the cache until the propagator is
    /// dropped.
    ///
    /// A member that lags behind the channel's buffer pulls the
    /// authoritative document instead of replaying the missed ones.
    pub async fn run<S>(mut self, source: S)
    where
        S: ConfigurationSource,
    {
        loop {
            match self.subscription.recv().await {
                Ok(document) => {
                    self.cache.apply(document);
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(member = %self.cache.id(), missed, "member lagged behind propagation, pulling");
                    self.cache.refresh(&source);
                }
                Err(RecvError::Closed) => {
                    info!(member = %self.cache.id(), version = %self.cache.version(), "propagation closed");
                    break;
                }
            }
        }
    }

    /// Spawns [`run`](Self::run) on the current tokio runtime.
    pub fn spawn<S>(self, source: S) -> JoinHandle<()>
    where
        S: ConfigurationSource + 'static,
    {
        tokio::spawn(self.run(source))
    }
}
