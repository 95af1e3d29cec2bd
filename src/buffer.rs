// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Bounded Event Buffer
//!
//! Ordered window of records, oldest first. Appends go to the tail and
//! eviction always takes from the head, so records ingested in the same cycle
//! leave in the order they arrived.
//!
//! The buffer may exceed its capacity between `append` and `trim_to_capacity`;
//! callers must trim before persisting.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::record::EventRecord;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundedEventBuffer {
    records: VecDeque<EventRecord>,
}

impl BoundedEventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<EventRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Appends to the tail, preserving the given order.
    pub fn append<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = EventRecord>,
    {
        self.records.extend(records);
    }

    /// Drops records from the head until `len() <= limit`.
    /// Returns the number of records evicted.
    pub fn trim_to_capacity(&mut self, limit: usize) -> usize {
        let excess = self.records.len().saturating_sub(limit);
        self.records.drain(..excess);
        excess
    }

    /// Current window, oldest first.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
