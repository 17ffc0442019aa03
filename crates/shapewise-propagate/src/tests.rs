//! Unit tests for shapewise-propagate

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use shapewise_store::{ConfigurationStore, ManualClock};
use shapewise_types::{
    ConfigurationDocument, Namespace, QuerySettings, QueryShapeConfiguration, ShapeKey, Version,
};
use tokio::sync::broadcast::error::TryRecvError;

use crate::{ConfigurationSource, Member, MemberCache, MemberId, Propagator, ReadSession};

// ============================================================================
// Test Helpers
// ============================================================================

fn store() -> Arc<ConfigurationStore> {
    Arc::new(ConfigurationStore::new(Arc::new(ManualClock::new())))
}

fn entry(byte: u8) -> QueryShapeConfiguration {
    QueryShapeConfiguration::new(
        ShapeKey::from_bytes([byte; 32]),
        Namespace::new("test", "c"),
        QuerySettings::new(json!({"queryFramework": "classic"})),
    )
}

/// Commits one swap that appends `entry(byte)` and returns the new document.
fn commit(store: &ConfigurationStore, byte: u8) -> Arc<ConfigurationDocument> {
    let current = store.read();
    let mut entries = current.entries.clone();
    entries.push(entry(byte));
    store.compare_and_swap(current.version, entries).unwrap()
}

fn doc_at(version: u64) -> Arc<ConfigurationDocument> {
    Arc::new(ConfigurationDocument {
        version: Version::new(version),
        ..ConfigurationDocument::new()
    })
}

// ============================================================================
// Propagator
// ============================================================================

#[test]
fn publish_reaches_every_subscriber() {
    let propagator = Propagator::new(16);
    let mut rx1 = propagator.subscribe();
    let mut rx2 = propagator.subscribe();
    assert_eq!(propagator.receiver_count(), 2);

    assert_eq!(propagator.publish(doc_at(1)), 2);

    assert_eq!(rx1.try_recv().unwrap().version, Version::new(1));
    assert_eq!(rx2.try_recv().unwrap().version, Version::new(1));
}

#[test]
fn publish_without_subscribers_is_not_an_error() {
    let propagator = Propagator::default();
    assert_eq!(propagator.publish(doc_at(1)), 0);
}

#[test]
fn slow_subscriber_observes_lag() {
    let propagator = Propagator::new(2);
    let mut rx = propagator.subscribe();

    for v in 1..=5 {
        propagator.publish(doc_at(v));
    }

    match rx.try_recv() {
        Err(TryRecvError::Lagged(n)) => assert!(n > 0),
        other => panic!("expected lagged error, got {other:?}"),
    }
}

// ============================================================================
// MemberCache
// ============================================================================

#[test]
fn cache_applies_only_newer_versions() {
    let cache = MemberCache::new(MemberId::new(1));

    assert!(cache.apply(doc_at(2)));
    assert!(!cache.apply(doc_at(2)), "duplicate delivery must be ignored");
    assert!(!cache.apply(doc_at(1)), "older delivery must be ignored");
    assert_eq!(cache.version(), Version::new(2));

    assert!(cache.apply(doc_at(5)));
    assert_eq!(cache.version(), Version::new(5));
}

#[test]
fn refresh_pulls_from_the_store() {
    let store = store();
    commit(&store, 1);
    commit(&store, 2);

    let cache = MemberCache::new(MemberId::new(1));
    assert!(cache.refresh(&*store));
    assert_eq!(cache.snapshot(), store.fetch());
}

#[test]
fn member_id_displays_with_prefix() {
    assert_eq!(MemberId::new(3).to_string(), "member-3");
}

// ============================================================================
// ReadSession
// ============================================================================

#[test]
fn session_pulls_when_cache_is_behind_an_acknowledged_write() {
    let store = store();
    let cache = Arc::new(MemberCache::new(MemberId::new(1)));
    let mut session = ReadSession::new(Arc::clone(&cache), store.clone());

    let written = commit(&store, 1);
    session.acknowledge(written.version);

    let read = session.read();
    assert_eq!(read.version, written.version);
    assert_eq!(cache.version(), written.version);
}

#[test]
fn session_never_regresses() {
    let store = store();
    commit(&store, 1);
    commit(&store, 2);

    let fresh = Arc::new(MemberCache::with_document(MemberId::new(1), store.read()));
    let mut session = ReadSession::new(fresh, store.clone());
    assert_eq!(session.read().version, Version::new(2));

    // Same session moved to a member that still caches version 0.
    let stale = Arc::new(MemberCache::new(MemberId::new(2)));
    let mut moved = ReadSession::new(Arc::clone(&stale), store.clone());
    moved.acknowledge(session.last_seen());

    assert_eq!(moved.read().version, Version::new(2));
}

#[test]
fn session_reads_cache_without_pulling_when_current() {
    let store = store();
    let cache = Arc::new(MemberCache::new(MemberId::new(1)));
    let mut session = ReadSession::new(Arc::clone(&cache), store.clone());

    // Store has moved but the session has not been told; the cached
    // version 0 is still a valid monotonic read.
    commit(&store, 1);
    assert_eq!(session.read().version, Version::ZERO);
}

// ============================================================================
// Member Loop
// ============================================================================

#[tokio::test]
async fn members_converge_on_published_documents() {
    let store = store();
    let propagator = Propagator::new(16);
    let caches: Vec<_> = (0..3)
        .map(|i| Arc::new(MemberCache::new(MemberId::new(i))))
        .collect();
    let handles: Vec<_> = caches
        .iter()
        .map(|cache| Member::new(Arc::clone(cache), propagator.subscribe()).spawn(store.clone()))
        .collect();

    for byte in 1..=4 {
        propagator.publish(commit(&store, byte));
    }
    drop(propagator);

    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("member loop should finish")
            .unwrap();
    }
    for cache in &caches {
        assert_eq!(cache.snapshot(), store.read());
    }
}

#[tokio::test]
async fn lagged_member_catches_up_by_pulling() {
    let store = store();
    let propagator = Propagator::new(1);
    let cache = Arc::new(MemberCache::new(MemberId::new(1)));
    let subscription = propagator.subscribe();

    for byte in 1..=10 {
        propagator.publish(commit(&store, byte));
    }

    let handle = Member::new(Arc::clone(&cache), subscription).spawn(store.clone());
    drop(propagator);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("member loop should finish")
        .unwrap();

    assert_eq!(cache.version(), Version::new(10));
    assert_eq!(cache.snapshot().len(), 10);
}

#[test]
fn zero_capacity_is_raised_to_one() {
    let store = store();
    let propagator = Propagator::new(0);
    assert_eq!(propagator.capacity(), 1);

    let mut member = Member::new(
        Arc::new(MemberCache::new(MemberId::new(1))),
        propagator.subscribe(),
    );
    assert_eq!(propagator.publish(commit(&store, 1)), 1);
    member.catch_up(&*store);
    assert_eq!(member.cache().version(), Version::new(1));
}

#[test]
fn catch_up_drains_queued_documents() {
    let store = store();
    let propagator = Propagator::new(16);
    let mut member = Member::new(
        Arc::new(MemberCache::new(MemberId::new(1))),
        propagator.subscribe(),
    );

    propagator.publish(commit(&store, 1));
    propagator.publish(commit(&store, 2));

    assert_eq!(member.catch_up(&*store), 2);
    assert_eq!(member.cache().version(), Version::new(2));
    assert_eq!(member.catch_up(&*store), 0);
}

#[test]
fn catch_up_after_lag_pulls_latest() {
    let store = store();
    let propagator = Propagator::new(1);
    let mut member = Member::new(
        Arc::new(MemberCache::new(MemberId::new(1))),
        propagator.subscribe(),
    );

    for byte in 1..=6 {
        propagator.publish(commit(&store, byte));
    }

    member.catch_up(&*store);
    assert_eq!(member.cache().snapshot(), store.read());
}

// ============================================================================
// Property-Based Tests
// ============================================================================

use proptest::prelude::*;

proptest! {
    /// Property: under any delivery order with duplicates, the cached
    /// version is non-decreasing and ends at the maximum delivered
    #[test]
    fn prop_cache_is_monotonic(deliveries in proptest::collection::vec(0u64..20, 1..60)) {
        let cache = MemberCache::new(MemberId::new(0));
        let mut previous = cache.version();

        for v in &deliveries {
            cache.apply(doc_at(*v));
            let now = cache.version();
            prop_assert!(now >= previous);
            previous = now;
        }

        let max = deliveries.iter().copied().max().unwrap_or(0);
        prop_assert_eq!(cache.version(), Version::new(max));
    }
}
