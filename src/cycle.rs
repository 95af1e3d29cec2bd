// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Refresh cycle primitives.
//!
//! The host drives I/O (load, fetch, persist, re-arm); everything between the
//! fetched bytes and the trimmed buffer lives here so it can be exercised
//! without a runtime.

use serde::Serialize;
use serde_json::Value;

use crate::buffer::BoundedEventBuffer;
use crate::config::{ALARM_INTERVAL_MS, EQ_LIMIT, EXPIRY_INTERVALS};
use crate::error::{KernelError, KernelResult};
use crate::types::candidate::Candidate;
use crate::types::record::EventRecord;

/// Timing and capacity for one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleParams {
    pub now_ms: u64,
    pub interval_ms: u64,
    pub limit: usize,
}

impl CycleParams {
    pub fn new(now_ms: u64, interval_ms: u64, limit: usize) -> Self {
        Self {
            now_ms,
            interval_ms,
            limit,
        }
    }

    pub fn at(now_ms: u64) -> Self {
        Self::new(now_ms, ALARM_INTERVAL_MS, EQ_LIMIT)
    }

    /// Lifetime assigned to records ingested this cycle.
    pub fn ttl_ms(&self) -> u64 {
        self.interval_ms.saturating_mul(EXPIRY_INTERVALS)
    }
}

/// What a committed cycle did to the window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub sampled: usize,
    pub evicted: usize,
    pub len: usize,
}

/// Result of a cycle that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// No source blob for this period; the window was left alone.
    SourceAbsent,
    Committed(MergeReport),
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::SourceAbsent => "source_absent",
            CycleOutcome::Committed(_) => "committed",
        }
    }
}

/// Resolves `pointer` in the source blob and decodes every entry as a
/// candidate. Any shape mismatch rejects the whole batch.
pub fn parse_candidates(raw: &[u8], pointer: &str) -> KernelResult<Vec<Candidate>> {
    let doc: Value =
        serde_json::from_slice(raw).map_err(|e| KernelError::SourceNotJson(e.to_string()))?;

    let entries = doc
        .pointer(pointer)
        .and_then(Value::as_array)
        .ok_or_else(|| KernelError::MissingCandidates(pointer.to_string()))?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value(entry.clone()).map_err(|e| KernelError::MalformedCandidate {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Appends freshly ingested records and trims back to `limit`.
pub fn merge(buffer: &mut BoundedEventBuffer, records: Vec<EventRecord>, limit: usize) -> MergeReport {
    let sampled = records.len();
    buffer.append(records);
    let evicted = buffer.trim_to_capacity(limit);
    MergeReport {
        sampled,
        evicted,
        len: buffer.len(),
    }
}
