//! Monotonic reads on top of a member cache.

use std::sync::Arc;

use shapewise_types::{ConfigurationDocument, Version};
use tracing::debug;

use crate::member::MemberCache;
use crate::source::ConfigurationSource;

/// A connection-scoped reader bound to one member.
///
/// Tracks the highest version it has returned or been told about. Once a
/// session has observed version V it never returns a document older than V.
pub struct ReadSession {
    cache: Arc<MemberCache>,
    source: Arc<dyn ConfigurationSource>,
    last_seen: Version,
}

impl ReadSession {
    pub fn new(cache: Arc<MemberCache>, source: Arc<dyn ConfigurationSource>) -> Self {
        Self {
            cache,
            source,
            last_seen: Version::ZERO,
        }
    }

    pub fn last_seen(&self) -> Version {
        self.last_seen
    }

    /// Records that the client has observed `version` elsewhere, e.g. as the
    /// result of its own write.
    pub fn acknowledge(&mut self, version: Version) {
        self.last_seen = self.last_seen.max(version);
    }

    /// Returns a document at least as new as anything this session has seen.
    ///
    /// Reads the member cache and falls back to pulling from the source if
    /// the cache has not caught up yet.
    pub fn read(&mut self) -> Arc<ConfigurationDocument> {
        let mut document = self.cache.snapshot();

        if document.version < self.last_seen {
            debug!(
                member = %self.cache.id(),
                cached = %document.version,
                last_seen = %self.last_seen,
                "member cache behind session, pulling"
            );
            self.cache.refresh(self.source.as_ref());
            document = self.cache.snapshot();
        }

        // Postcondition: never regress below what this session has seen
        debug_assert!(document.version >= self.last_seen);

        self.last_seen = document.version;
        document
    }
}

impl std::fmt::Debug for ReadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadSession")
            .field("member", &self.cache.id())
            .field("last_seen", &self.last_seen)
            .finish_non_exhaustive()
    }
}
