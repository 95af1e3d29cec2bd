// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use opendal::{services, Operator};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use tempfile::tempdir;

use quakewatch_kernel::alarm::ActorPhase;
use quakewatch_kernel::buffer::BoundedEventBuffer;
use quakewatch_kernel::cycle::CycleOutcome;
use quakewatch_kernel::types::{Candidate, EventRecord};
use quakewatch_node::engine::{ActorSettings, WindowActor};
use quakewatch_node::errors::EngineError;
use quakewatch_node::source::CandidateSource;
use quakewatch_node::storage::ActorStorage;

// 2023-11-14T22:13:20Z
const NOW: u64 = 1_700_000_000_000;
const INTERVAL: u64 = 30_000;
const LIMIT: usize = 10;
const KEY: &str = "earthquakes/2023-11-14.json";

fn memory_op() -> Operator {
    Operator::new(services::Memory::default()).unwrap().finish()
}

async fn open_actor(dir: &Path, op: Operator, seed: u64) -> WindowActor {
    let storage = ActorStorage::open(dir, "quakes").await.unwrap();
    let source = CandidateSource::new(op, "earthquakes/{date}.json", Duration::from_secs(5));
    let settings = ActorSettings {
        interval_ms: INTERVAL,
        limit: LIMIT,
        pointer: "/data/earthquakes".to_string(),
    };
    WindowActor::open_with(storage, source, settings, StdRng::seed_from_u64(seed))
        .await
        .unwrap()
}

fn batch(n: usize) -> Vec<u8> {
    let quakes: Vec<_> = (0..n)
        .map(|i| json!({ "id": format!("ci{}", i), "place": format!("{}km SW of Ridgecrest", i), "time": "2023-11-14T21:00:00Z", "mag": 1.5 }))
        .collect();
    serde_json::to_vec(&json!({ "data": { "earthquakes": quakes } })).unwrap()
}

async fn seed_window(dir: &Path, n: usize) -> BoundedEventBuffer {
    let storage = ActorStorage::open(dir, "quakes").await.unwrap();
    let window = BoundedEventBuffer::from_records(
        (0..n)
            .map(|i| EventRecord::ingest(Candidate::new(format!("old{}", i), "x", "t"), NOW - 1, INTERVAL))
            .collect(),
    );
    storage.store_window(&window).await.unwrap();
    window
}

#[tokio::test]
async fn test_absent_source_keeps_window_and_rearms() {
    let dir = tempdir().unwrap();
    let before = seed_window(dir.path(), 4).await;
    let mut actor = open_actor(dir.path(), memory_op(), 1).await;

    let outcome = actor.on_alarm(NOW).await.unwrap();
    assert_eq!(outcome, CycleOutcome::SourceAbsent);

    let after = actor.current_window().await.unwrap();
    assert_eq!(after, before.snapshot());
    assert_eq!(actor.alarm().next_wake(), Some(NOW + INTERVAL));
    assert_eq!(actor.phase(), ActorPhase::Scheduled);

    // The re-arm is durable
    let stored = actor.storage().load_alarm().await.unwrap();
    assert_eq!(stored.next_wake(), Some(NOW + INTERVAL));
}

#[tokio::test]
async fn test_empty_source_object_is_absent() {
    let dir = tempdir().unwrap();
    let op = memory_op();
    op.write(KEY, Vec::<u8>::new()).await.unwrap();
    let mut actor = open_actor(dir.path(), op, 1).await;

    assert_eq!(actor.on_alarm(NOW).await.unwrap(), CycleOutcome::SourceAbsent);
    assert!(actor.current_window().await.unwrap().is_empty());
    assert!(actor.alarm().is_armed());
}

#[tokio::test]
async fn test_malformed_source_aborts_but_rearms() {
    let dir = tempdir().unwrap();
    let before = seed_window(dir.path(), 3).await;
    let op = memory_op();
    op.write(KEY, b"{\"data\":{\"earthquakes\":[{\"id\":\"x\"}]}}".to_vec())
        .await
        .unwrap();
    let mut actor = open_actor(dir.path(), op, 1).await;

    let err = actor.on_alarm(NOW).await.unwrap_err();
    assert!(matches!(err, EngineError::SourceMalformed(_)), "got {:?}", err);
    assert!(!err.is_fatal());

    assert_eq!(actor.current_window().await.unwrap(), before.snapshot());
    assert_eq!(actor.alarm().next_wake(), Some(NOW + INTERVAL));
}

#[tokio::test]
async fn test_unreadable_source_aborts_but_rearms() {
    let dir = tempdir().unwrap();
    let before = seed_window(dir.path(), 3).await;

    // The dated key exists but is a directory, so the read itself fails
    let feed = tempdir().unwrap();
    std::fs::create_dir_all(feed.path().join(KEY)).unwrap();
    let op = Operator::new(services::Fs::default().root(&feed.path().to_string_lossy()))
        .unwrap()
        .finish();
    let mut actor = open_actor(dir.path(), op, 1).await;

    let err = actor.on_alarm(NOW).await.unwrap_err();
    assert!(matches!(err, EngineError::SourceFetch(_)), "got {:?}", err);
    assert!(!err.is_fatal());

    assert_eq!(actor.current_window().await.unwrap(), before.snapshot());
    assert_eq!(actor.alarm().next_wake(), Some(NOW + INTERVAL));
    assert_eq!(actor.phase(), ActorPhase::Scheduled);
    let stored = actor.storage().load_alarm().await.unwrap();
    assert_eq!(stored.next_wake(), Some(NOW + INTERVAL));
}

#[tokio::test]
async fn test_not_json_source_aborts_but_rearms() {
    let dir = tempdir().unwrap();
    let op = memory_op();
    op.write(KEY, b"<!doctype html>".to_vec()).await.unwrap();
    let mut actor = open_actor(dir.path(), op, 1).await;

    assert!(matches!(
        actor.on_alarm(NOW).await,
        Err(EngineError::SourceMalformed(_))
    ));
    assert!(actor.current_window().await.unwrap().is_empty());
    assert_eq!(actor.alarm().next_wake(), Some(NOW + INTERVAL));
}

#[tokio::test]
async fn test_committed_cycle_enriches_records() {
    let dir = tempdir().unwrap();
    let op = memory_op();
    op.write(KEY, batch(3)).await.unwrap();
    let mut actor = open_actor(dir.path(), op, 11).await;

    let report = match actor.on_alarm(NOW).await.unwrap() {
        CycleOutcome::Committed(report) => report,
        other => panic!("unexpected {:?}", other),
    };
    assert!(report.sampled < LIMIT);
    assert_eq!(report.evicted, 0);

    let window = actor.current_window().await.unwrap();
    assert_eq!(window.len(), report.sampled);

    let uuids: HashSet<_> = window.iter().map(|r| r.uuid).collect();
    assert_eq!(uuids.len(), window.len());
    for record in &window {
        assert_eq!(record.expiry, NOW + 2 * INTERVAL);
        let id = record.field("id").and_then(|v| v.as_str()).unwrap();
        assert!(["ci0", "ci1", "ci2"].contains(&id));
        assert_eq!(record.field("mag"), Some(&json!(1.5)));
    }
    assert_eq!(actor.alarm().next_wake(), Some(NOW + INTERVAL));
}

#[tokio::test]
async fn test_window_never_exceeds_limit() {
    let dir = tempdir().unwrap();
    let op = memory_op();
    op.write(KEY, batch(5)).await.unwrap();
    let mut actor = open_actor(dir.path(), op, 3).await;

    let mut previous: Vec<EventRecord> = Vec::new();
    for i in 0..30 {
        let now = NOW + i * INTERVAL;
        let report = match actor.on_alarm(now).await.unwrap() {
            CycleOutcome::Committed(report) => report,
            other => panic!("unexpected {:?}", other),
        };
        let window = actor.current_window().await.unwrap();
        assert!(window.len() <= LIMIT);
        assert_eq!(window.len(), report.len);

        // Survivors keep their relative order at the front
        assert_eq!(report.evicted, previous.len() + report.sampled - window.len());
        assert_eq!(&window[..previous.len() - report.evicted], &previous[report.evicted..]);
        previous = window;
    }
    assert_eq!(previous.len(), LIMIT);
}

#[tokio::test]
async fn test_empty_candidate_array_commits_unchanged_window() {
    let dir = tempdir().unwrap();
    let before = seed_window(dir.path(), 2).await;
    let op = memory_op();
    op.write(KEY, batch(0)).await.unwrap();
    let mut actor = open_actor(dir.path(), op, 1).await;

    let outcome = actor.on_alarm(NOW).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Committed(r) if r.sampled == 0 && r.len == 2));
    assert_eq!(actor.current_window().await.unwrap(), before.snapshot());
}

#[tokio::test]
async fn test_set_enabled_is_idempotent() {
    let dir = tempdir().unwrap();
    let mut actor = open_actor(dir.path(), memory_op(), 1).await;
    assert_eq!(actor.phase(), ActorPhase::Idle);

    assert!(actor.set_enabled(true, NOW).await.unwrap());
    assert_eq!(actor.alarm().next_wake(), Some(NOW + INTERVAL));

    // Second enable does not move the pending alarm
    assert!(actor.set_enabled(true, NOW + 5_000).await.unwrap());
    assert_eq!(actor.alarm().next_wake(), Some(NOW + INTERVAL));
    assert_eq!(
        actor.storage().load_alarm().await.unwrap().next_wake(),
        Some(NOW + INTERVAL)
    );

    assert!(!actor.set_enabled(false, NOW).await.unwrap());
    assert_eq!(actor.phase(), ActorPhase::Idle);
    assert!(!actor.storage().load_alarm().await.unwrap().is_armed());

    // Disabling again is a no-op
    assert!(!actor.set_enabled(false, NOW).await.unwrap());
}

#[tokio::test]
async fn test_alarm_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let mut actor = open_actor(dir.path(), memory_op(), 1).await;
        actor.set_enabled(true, NOW).await.unwrap();
    }
    let actor = open_actor(dir.path(), memory_op(), 1).await;
    assert_eq!(actor.alarm().next_wake(), Some(NOW + INTERVAL));
    assert_eq!(actor.phase(), ActorPhase::Scheduled);
}

#[tokio::test]
async fn test_storage_failure_is_fatal_and_skips_rearm() {
    let dir = tempdir().unwrap();
    let op = memory_op();
    op.write(KEY, batch(3)).await.unwrap();
    let mut actor = open_actor(dir.path(), op, 1).await;
    actor.set_enabled(true, NOW).await.unwrap();

    // A directory where the window file belongs makes every read fail
    std::fs::create_dir_all(actor.storage().dir().join("earthquakes.state")).unwrap();

    let err = actor.on_alarm(NOW + INTERVAL).await.unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)), "got {:?}", err);
    assert!(err.is_fatal());

    // The fired alarm is still pending, so the driver will retry it
    assert_eq!(actor.alarm().next_wake(), Some(NOW + INTERVAL));
    assert!(actor.alarm().is_due(NOW + INTERVAL));
}
