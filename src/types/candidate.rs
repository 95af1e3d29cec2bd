// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Candidate records as published by the upstream source.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One source-provided earthquake eligible for sampling.
///
/// `id`, `place` and `time` are required; anything else the source publishes
/// is carried along untouched in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub place: String,
    pub time: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, place: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            place: place.into(),
            time: time.into(),
            extra: Map::new(),
        }
    }

    /// Flattens the candidate back into its attribute bag.
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = self.extra;
        fields.insert("id".into(), Value::String(self.id));
        fields.insert("place".into(), Value::String(self.place));
        fields.insert("time".into(), Value::String(self.time));
        fields
    }
}
