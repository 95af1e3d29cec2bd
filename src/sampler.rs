// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Source Sampler
//!
//! Picks a random subset of a candidate batch. The sample count is drawn in
//! `[0, limit)` and each index is drawn independently in `[0, len)`, so the
//! same candidate can be selected more than once in a single draw.
//!
//! Drawing is split from selection: `SourceSampler::plan` consumes randomness
//! and yields a `SamplePlan`, which is a plain list of indexes that can be
//! applied (or constructed directly) without touching the RNG.

use rand::Rng;

use crate::types::candidate::Candidate;
use crate::types::record::EventRecord;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SamplePlan {
    indexes: Vec<usize>,
}

impl SamplePlan {
    pub fn new(indexes: Vec<usize>) -> Self {
        Self { indexes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Candidates in draw order, duplicates included.
    /// Indexes past the end of `candidates` are skipped.
    pub fn select(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        self.indexes
            .iter()
            .filter_map(|&i| candidates.get(i).cloned())
            .collect()
    }

    /// Selects and enriches in one pass.
    pub fn ingest(&self, candidates: &[Candidate], now_ms: u64, ttl_ms: u64) -> Vec<EventRecord> {
        self.select(candidates)
            .into_iter()
            .map(|c| EventRecord::ingest(c, now_ms, ttl_ms))
            .collect()
    }
}

pub struct SourceSampler<R> {
    rng: R,
    limit: usize,
}

impl<R: Rng> SourceSampler<R> {
    pub fn new(rng: R, limit: usize) -> Self {
        Self { rng, limit }
    }

    /// Draws a plan over a batch of `candidates` entries.
    ///
    /// An empty batch (or a zero limit) yields an empty plan without consuming
    /// randomness.
    pub fn plan(&mut self, candidates: usize) -> SamplePlan {
        if candidates == 0 || self.limit == 0 {
            return SamplePlan::empty();
        }
        let n = self.rng.gen_range(0..self.limit);
        let indexes = (0..n).map(|_| self.rng.gen_range(0..candidates)).collect();
        SamplePlan { indexes }
    }
}
