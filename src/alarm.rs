// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Alarm state machine.
//!
//! ```text
//!   Idle --enable--> Scheduled --fire--> Running --rearm--> Scheduled
//!    ^                  |                   |
//!    +-----disable------+-------disable-----+
//! ```
//!
//! At most one wake is pending. The state is persisted verbatim by the host.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmState {
    next_wake_ms: Option<u64>,
}

impl AlarmState {
    pub fn disarmed() -> Self {
        Self { next_wake_ms: None }
    }

    pub fn armed_at(wake_ms: u64) -> Self {
        Self {
            next_wake_ms: Some(wake_ms),
        }
    }

    pub fn next_wake(&self) -> Option<u64> {
        self.next_wake_ms
    }

    pub fn is_armed(&self) -> bool {
        self.next_wake_ms.is_some()
    }

    /// Arms `now + interval` unless a wake is already pending.
    /// Returns true when a new wake was armed.
    pub fn arm_if_absent(&mut self, now_ms: u64, interval_ms: u64) -> bool {
        if self.next_wake_ms.is_some() {
            return false;
        }
        self.next_wake_ms = Some(now_ms.saturating_add(interval_ms));
        true
    }

    /// Unconditionally schedules the next wake, replacing any pending one.
    pub fn rearm(&mut self, now_ms: u64, interval_ms: u64) -> u64 {
        let wake = now_ms.saturating_add(interval_ms);
        self.next_wake_ms = Some(wake);
        wake
    }

    /// Clears any pending wake. Returns true if one was pending.
    pub fn disarm(&mut self) -> bool {
        self.next_wake_ms.take().is_some()
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        matches!(self.next_wake_ms, Some(wake) if wake <= now_ms)
    }
}

/// Observable lifecycle phase of the refresh actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ActorPhase {
    Idle,
    Scheduled,
    Running,
}

impl ActorPhase {
    pub fn of(alarm: &AlarmState, running: bool) -> Self {
        if running {
            ActorPhase::Running
        } else if alarm.is_armed() {
            ActorPhase::Scheduled
        } else {
            ActorPhase::Idle
        }
    }
}
