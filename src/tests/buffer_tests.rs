// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::buffer::BoundedEventBuffer;
use crate::types::candidate::Candidate;
use crate::types::record::EventRecord;

fn record(n: usize) -> EventRecord {
    EventRecord::ingest(Candidate::new(format!("eq{}", n), "somewhere", "2025-01-01T00:00:00Z"), 1_000, 60_000)
}

fn ids(buffer: &BoundedEventBuffer) -> Vec<String> {
    buffer
        .iter()
        .map(|r| r.field("id").and_then(|v| v.as_str()).unwrap().to_string())
        .collect()
}

#[test]
fn test_append_preserves_order() {
    let mut buffer = BoundedEventBuffer::new();
    buffer.append((0..3).map(record));
    buffer.append((3..5).map(record));

    assert_eq!(buffer.len(), 5);
    assert_eq!(ids(&buffer), vec!["eq0", "eq1", "eq2", "eq3", "eq4"]);
}

#[test]
fn test_trim_evicts_oldest_first() {
    let mut buffer = BoundedEventBuffer::from_records((0..10).map(record).collect());
    buffer.append((10..14).map(record));
    assert_eq!(buffer.len(), 14);

    let evicted = buffer.trim_to_capacity(10);
    assert_eq!(evicted, 4);
    assert_eq!(buffer.len(), 10);

    // Newest 6 of the original, then all 4 new, in original relative order.
    let expected: Vec<String> = (4..14).map(|n| format!("eq{}", n)).collect();
    assert_eq!(ids(&buffer), expected);
}

#[test]
fn test_trim_same_cycle_ties_leave_in_append_order() {
    let mut buffer = BoundedEventBuffer::new();
    buffer.append((0..6).map(record));
    buffer.trim_to_capacity(2);
    assert_eq!(ids(&buffer), vec!["eq4", "eq5"]);
}

#[test]
fn test_trim_under_capacity_is_noop() {
    let mut buffer = BoundedEventBuffer::from_records((0..3).map(record).collect());
    assert_eq!(buffer.trim_to_capacity(10), 0);
    assert_eq!(buffer.len(), 3);

    assert_eq!(buffer.trim_to_capacity(0), 3);
    assert!(buffer.is_empty());
}

#[test]
fn test_snapshot_does_not_mutate() {
    let buffer = BoundedEventBuffer::from_records((0..4).map(record).collect());
    let snap = buffer.snapshot();
    assert_eq!(snap.len(), 4);
    assert_eq!(buffer.len(), 4);
    assert_eq!(snap, buffer.iter().cloned().collect::<Vec<_>>());
}

#[test]
fn test_serde_roundtrip_preserves_records() {
    let mut candidate = Candidate::new("us7000abcd", "10km N of Nowhere", "2025-03-02T10:00:00Z");
    candidate.extra.insert("mag".into(), serde_json::json!(4.2));
    let buffer = BoundedEventBuffer::from_records(vec![
        EventRecord::ingest(candidate, 5_000, 60_000),
        record(1),
    ]);

    let json = serde_json::to_vec(&buffer).unwrap();
    let restored: BoundedEventBuffer = serde_json::from_slice(&json).unwrap();

    assert_eq!(restored, buffer);
    let first = &restored.snapshot()[0];
    assert_eq!(first.expiry, 65_000);
    assert_eq!(first.field("mag"), Some(&serde_json::json!(4.2)));
}
