// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Alarm driver.
//!
//! Sleeps until the actor's pending alarm is due and fires it. The actor
//! re-arms itself at the end of every cycle, so the driver only ever reacts to
//! the stored wake time; it never schedules on its own.
//!
//! A failed invocation (storage error) leaves the alarm due. The driver
//! retries it with exponential backoff and, after `max_attempts`, disarms the
//! actor; the next request's feature check arms it again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::engine::{now_millis, SharedActor};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

pub fn spawn_alarm_driver(actor: SharedActor, signal: Arc<Notify>, retry: RetryPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut failures: u32 = 0;
        loop {
            let next = actor.lock().await.alarm().next_wake();
            let Some(wake) = next else {
                signal.notified().await;
                continue;
            };

            let now = now_millis();
            if wake > now {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(wake - now)) => {}
                    _ = signal.notified() => continue,
                }
            }

            let mut guard = actor.lock().await;
            let now = now_millis();
            if !guard.alarm().is_due(now) {
                continue;
            }

            let fired = guard.on_alarm(now).await;
            match fired {
                Ok(outcome) => {
                    failures = 0;
                    tracing::debug!("Alarm fired: {:?}", outcome);
                }
                // Already re-armed by the actor.
                Err(e) if !e.is_fatal() => {
                    failures = 0;
                    tracing::debug!("Alarm fired with a recovered error: {}", e);
                }
                Err(e) => {
                    failures += 1;
                    if failures >= retry.max_attempts {
                        tracing::error!("Alarm failed {} times, giving up: {}", failures, e);
                        let disarmed = guard.set_enabled(false, now).await;
                        drop(guard);
                        failures = 0;
                        if let Err(e) = disarmed {
                            tracing::error!("Failed to disarm after retries: {}", e);
                            tokio::time::sleep(retry.delay(retry.max_attempts)).await;
                        }
                        continue;
                    }
                    drop(guard);
                    let delay = retry.delay(failures);
                    tracing::warn!("Alarm failed (attempt {}), retrying in {:?}: {}", failures, delay, e);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    })
}
