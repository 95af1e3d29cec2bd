// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Window record definition.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::types::candidate::Candidate;

/// Keys owned by the record itself. Source fields with these names are dropped
/// at ingestion so they cannot shadow the assigned values.
pub const RESERVED_KEYS: [&str; 2] = ["uuid", "expiry"];

/// One earthquake held in the window.
///
/// Immutable once ingested. `expiry` is advisory: records leave the window
/// through capacity eviction only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Assigned at ingestion, independent of the source's own `id`.
    pub uuid: Uuid,
    /// Epoch milliseconds after which the record is stale.
    pub expiry: u64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EventRecord {
    /// Enriches a sampled candidate with a fresh uuid and an expiry of
    /// `now_ms + ttl_ms`.
    pub fn ingest(candidate: Candidate, now_ms: u64, ttl_ms: u64) -> Self {
        let mut fields = candidate.into_fields();
        for key in RESERVED_KEYS {
            fields.remove(key);
        }
        Self {
            uuid: Uuid::new_v4(),
            expiry: now_ms.saturating_add(ttl_ms),
            fields,
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expiry
    }
}
