// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};

use quakewatch_kernel::alarm::ActorPhase;
use quakewatch_kernel::types::EventRecord;

#[derive(Serialize, Deserialize, Debug)]
pub struct WindowResponse {
    pub earthquakes: Vec<EventRecord>,
}

#[derive(Serialize, Debug)]
pub struct StatusResponse {
    pub phase: ActorPhase,
    pub next_wake_ms: Option<u64>,
    /// Only reported to verified callers.
    pub window_len: Option<usize>,
    pub live_window: bool,
}
