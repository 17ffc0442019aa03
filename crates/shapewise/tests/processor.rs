//! Command processor behavior through the public API.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use serde_json::json;
use shapewise::{
    Change, ErrorCode, ManualClock, MemberId, Namespace, QuerySettings, RepresentativeQuery,
    ShapeKey, Shapewise, ShapewiseOptions, Version, derive_shape_key,
};
use test_case::test_case;

// ============================================================================
// Test Helpers
// ============================================================================

fn ns() -> Namespace {
    Namespace::new("test", "orders")
}

fn find(filter: serde_json::Value) -> RepresentativeQuery {
    RepresentativeQuery::find(ns(), filter)
}

fn settings(index: &str) -> QuerySettings {
    QuerySettings::new(json!({"indexHints": {"allowedIndexes": [index]}}))
}

fn db() -> Shapewise {
    Shapewise::with_clock(Arc::new(ManualClock::new()), &ShapewiseOptions::default())
}

fn db_with_fail_points() -> Arc<Shapewise> {
    Arc::new(Shapewise::in_memory(
        &ShapewiseOptions::default().with_fail_points(Duration::from_secs(30)),
    ))
}

// ============================================================================
// Set & Remove
// ============================================================================

#[test]
fn set_then_lookup_by_any_literal() {
    let db = db();
    db.processor()
        .set_query_settings(&find(json!({"a": 1})), settings("a_1"))
        .unwrap();

    let hit = db.processor().settings_for(&find(json!({"a": 42}))).unwrap();
    let miss = db.processor().settings_for(&find(json!({"b": 1}))).unwrap();

    assert_eq!(hit, Some(settings("a_1")));
    assert_eq!(miss, None);
}

#[test]
fn identical_set_still_advances_version() {
    let db = db();
    let query = find(json!({"a": 1}));

    let first = db
        .processor()
        .set_query_settings(&query, settings("a_1"))
        .unwrap();
    let second = db
        .processor()
        .set_query_settings(&query, settings("a_1"))
        .unwrap();

    assert_eq!(first.change, Change::Inserted);
    assert_eq!(second.change, Change::Replaced);
    assert_eq!(second.document.version, first.document.version.next());
    assert_eq!(second.document.entries, first.document.entries);
    assert!(second.document.cluster_time > first.document.cluster_time);
}

#[test]
fn removing_absent_settings_is_a_silent_noop() {
    let db = db();
    db.processor()
        .set_query_settings(&find(json!({"a": 1})), settings("a_1"))
        .unwrap();
    let before = db.store().read();

    let outcome = db
        .processor()
        .remove_query_settings(&find(json!({"zzz": 1})))
        .unwrap();

    assert!(!outcome.committed());
    assert_eq!(outcome.change, Change::NotPresent);
    assert_eq!(db.store().read(), before);
}

#[test]
fn remove_all_clears_and_keeps_version_monotonic() {
    let db = db();
    db.processor()
        .set_query_settings(&find(json!({"a": 1})), settings("a_1"))
        .unwrap();
    db.processor()
        .set_query_settings(&find(json!({"b": 1})), settings("b_1"))
        .unwrap();

    let doc = db.processor().remove_all_query_settings();

    assert!(doc.is_empty());
    assert_eq!(doc.version, Version::new(3));
}

// ============================================================================
// Validation
// ============================================================================

#[test_case(json!({}) ; "empty settings")]
#[test_case(json!(["a_1"]) ; "array settings")]
fn invalid_settings_never_touch_the_store(value: serde_json::Value) {
    let db = db();
    let err = db
        .processor()
        .set_query_settings(&find(json!({"a": 1})), QuerySettings::new(value))
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert!(!err.is_retryable());
    assert_eq!(db.store().version(), Version::ZERO);
}

#[test_case("admin" ; "admin")]
#[test_case("config" ; "config")]
#[test_case("local" ; "local")]
fn internal_databases_are_invalid(db_name: &str) {
    let db = db();
    let query = RepresentativeQuery::find(Namespace::new(db_name, "c"), json!({"a": 1}));
    let err = db
        .processor()
        .set_query_settings(&query, settings("a_1"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

// ============================================================================
// Shape Hash Addressing
// ============================================================================

#[test]
fn set_by_hash_updates_existing_entry_only() {
    let db = db();
    let query = find(json!({"a": 1}));
    let key = derive_shape_key(&query).unwrap();

    let err = db
        .processor()
        .set_query_settings_by_hash(key, settings("a_1"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    db.processor()
        .set_query_settings(&query, settings("a_1"))
        .unwrap();
    db.processor()
        .set_query_settings_by_hash(key, settings("a_2"))
        .unwrap();

    let entry = db.store().read().get(&key).cloned().unwrap();
    assert_eq!(entry.settings, settings("a_2"));
    assert_eq!(entry.representative_query, Some(query));
}

#[test]
fn remove_by_hash_parsed_from_hex() {
    let db = db();
    let query = find(json!({"a": 1}));
    let key = derive_shape_key(&query).unwrap();
    db.processor()
        .set_query_settings(&query, settings("a_1"))
        .unwrap();

    let parsed: ShapeKey = key.to_string().to_lowercase().parse().unwrap();
    let outcome = db.processor().remove_query_settings_by_hash(parsed).unwrap();

    assert_eq!(outcome.change, Change::Removed);
    assert!(db.store().read().is_empty());
}

#[test]
fn listing_includes_debug_shape_on_request() {
    let db = db();
    db.processor()
        .set_query_settings(&find(json!({"a": 1})), settings("a_1"))
        .unwrap();

    let plain = db.processor().query_settings(false).unwrap();
    let debug = db.processor().query_settings(true).unwrap();

    assert_eq!(plain.len(), 1);
    assert!(plain[0].debug_query_shape.is_none());
    assert_eq!(
        debug[0].debug_query_shape.as_ref().unwrap()["filter"],
        json!({"a": "?number"})
    );

    let rendered = serde_json::to_value(&plain[0]).unwrap();
    assert_eq!(rendered["queryShapeHash"], json!(plain[0].query_shape_hash.to_string()));
    assert!(rendered.get("debugQueryShape").is_none());
}

// ============================================================================
// Concurrency
// ============================================================================

/// Holds both commands after their reads, then releases them together.
fn race(db: &Arc<Shapewise>, first: RepresentativeQuery, second: RepresentativeQuery) -> usize {
    let fail_point = Arc::clone(db.fail_point().unwrap());
    fail_point.enable_when(|_| true);

    let handles: Vec<_> = [first, second]
        .into_iter()
        .enumerate()
        .map(|(i, query)| {
            let db = Arc::clone(db);
            thread::spawn(move || {
                db.processor()
                    .set_query_settings(&query, settings(&format!("idx_{i}")))
            })
        })
        .collect();

    assert!(fail_point.wait_for_hit(2, Duration::from_secs(10)));
    fail_point.disable();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.code(), ErrorCode::ConflictingOperationInProgress);
    }
    results.iter().filter(|r| r.is_ok()).count()
}

#[test]
fn same_key_race_has_exactly_one_winner() {
    let db = db_with_fail_points();
    let wins = race(&db, find(json!({"a": 1})), find(json!({"a": 2})));

    assert_eq!(wins, 1);
    let doc = db.store().read();
    assert_eq!(doc.version, Version::new(1));
    assert_eq!(doc.len(), 1);
}

#[test]
fn disjoint_key_race_still_has_exactly_one_winner() {
    let db = db_with_fail_points();
    let wins = race(&db, find(json!({"a": 1})), find(json!({"b": 1})));

    assert_eq!(wins, 1);
    assert_eq!(db.store().read().len(), 1);
}

#[test]
fn set_and_remove_race_never_merges() {
    let db = db_with_fail_points();
    let query_a = find(json!({"a": 1}));
    let query_b = find(json!({"b": 1}));
    db.processor()
        .set_query_settings(&query_b, settings("b_1"))
        .unwrap();

    let fail_point = Arc::clone(db.fail_point().unwrap());
    fail_point.enable_when(|_| true);

    let setter = {
        let db = Arc::clone(&db);
        let query_a = query_a.clone();
        thread::spawn(move || db.processor().set_query_settings(&query_a, settings("a_1")))
    };
    let remover = {
        let db = Arc::clone(&db);
        let query_b = query_b.clone();
        thread::spawn(move || db.processor().remove_query_settings(&query_b))
    };

    assert!(fail_point.wait_for_hit(2, Duration::from_secs(10)));
    fail_point.disable();
    let set_won = setter.join().unwrap().is_ok();
    let remove_won = remover.join().unwrap().is_ok();
    assert!(set_won ^ remove_won);

    let doc = db.store().read();
    let key_a = derive_shape_key(&query_a).unwrap();
    let key_b = derive_shape_key(&query_b).unwrap();
    if set_won {
        assert!(doc.contains(&key_a) && doc.contains(&key_b));
    } else {
        assert!(doc.is_empty());
    }
}

#[test]
fn unsynchronized_writers_never_lose_a_committed_update() {
    const WRITERS: usize = 8;
    let db = Arc::new(db());
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut committed = 0u64;
                for round in 0..20 {
                    let field = format!("f{i}_{round}");
                    let query = find(json!({ field: 1 }));
                    if db.processor().set_query_settings(&query, settings("x_1")).is_ok() {
                        committed += 1;
                    }
                }
                committed
            })
        })
        .collect();

    let committed: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let doc = db.store().read();

    assert_eq!(doc.version, Version::new(committed));
    assert_eq!(doc.len() as u64, committed);
}

// ============================================================================
// Propagation
// ============================================================================

#[test]
fn members_observe_committed_versions() {
    let db = db();
    for i in 0..3 {
        db.processor()
            .set_query_settings(&find(json!({ format!("f{i}"): 1 })), settings("x_1"))
            .unwrap();
    }

    let versions = db.sync_members();
    assert_eq!(versions.len(), 3);
    assert!(versions.iter().all(|(_, v)| *v == Version::new(3)));
}

#[test]
fn session_reads_its_own_write_before_members_sync() {
    let db = db();
    let mut session = db.session(MemberId::new(0)).unwrap();

    let outcome = db
        .processor()
        .set_query_settings(&find(json!({"a": 1})), settings("a_1"))
        .unwrap();
    session.acknowledge(outcome.document.version);

    assert_eq!(session.read().version, Version::new(1));
}

#[test]
fn zero_channel_capacity_still_propagates() {
    let options = ShapewiseOptions {
        channel_capacity: 0,
        ..ShapewiseOptions::default()
    };
    let db = Shapewise::in_memory(&options);
    assert_eq!(db.propagator().capacity(), 1);

    db.processor()
        .set_query_settings(&find(json!({"a": 1})), settings("a_1"))
        .unwrap();
    assert!(
        db.sync_members()
            .iter()
            .all(|(_, version)| *version == Version::new(1))
    );
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn reopened_instance_resumes_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("query_settings.json");

    let db = Shapewise::open(&path, &ShapewiseOptions::default()).unwrap();
    db.processor()
        .set_query_settings(&find(json!({"a": 1})), settings("a_1"))
        .unwrap();
    db.save(&path).unwrap();
    drop(db);

    let db = Shapewise::open(&path, &ShapewiseOptions::default()).unwrap();
    assert_eq!(db.store().version(), Version::new(1));
    let outcome = db
        .processor()
        .remove_query_settings(&find(json!({"a": 7})))
        .unwrap();
    assert_eq!(outcome.document.version, Version::new(2));
    assert!(outcome.document.is_empty());
}

#[test]
fn second_instance_saving_stale_document_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("query_settings.json");

    let left = Shapewise::open(&path, &ShapewiseOptions::default()).unwrap();
    let right = Shapewise::open(&path, &ShapewiseOptions::default()).unwrap();

    left.processor()
        .set_query_settings(&find(json!({"a": 1})), settings("a_1"))
        .unwrap();
    right
        .processor()
        .set_query_settings(&find(json!({"b": 1})), settings("b_1"))
        .unwrap();

    left.save(&path).unwrap();
    let err = right.save(&path).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConflictingOperationInProgress);

    // The loser retries from a fresh read and both entries survive.
    drop(right);
    let right = Shapewise::open(&path, &ShapewiseOptions::default()).unwrap();
    right
        .processor()
        .set_query_settings(&find(json!({"b": 1})), settings("b_1"))
        .unwrap();
    right.save(&path).unwrap();

    let reopened = Shapewise::open(&path, &ShapewiseOptions::default()).unwrap();
    let document = reopened.store().read();
    assert_eq!(document.version, Version::new(2));
    assert_eq!(document.len(), 2);
}

// ============================================================================
// Property-Based Tests
// ============================================================================

use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: each committed command advances the version by exactly one
    #[test]
    fn prop_committed_commands_advance_version_by_one(
        ops in proptest::collection::vec((any::<bool>(), 0u8..6), 1..30)
    ) {
        let db = db();
        for (is_set, field) in ops {
            let query = find(json!({ format!("f{field}"): 1 }));
            let before = db.store().version();
            let outcome = if is_set {
                db.processor().set_query_settings(&query, settings("x_1")).unwrap()
            } else {
                db.processor().remove_query_settings(&query).unwrap()
            };
            let expected = if outcome.committed() { before.next() } else { before };
            prop_assert_eq!(db.store().version(), expected);
        }
    }
}
