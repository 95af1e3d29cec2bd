// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The window actor.
//!
//! One instance owns one storage directory, one alarm and one window. Callers
//! hold it behind `SharedActor`, and every invocation (request or alarm fire)
//! takes the lock for its whole duration, so the load → mutate → persist
//! sequence of a cycle never interleaves with another invocation.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{Mutex, Notify};

use quakewatch_kernel::alarm::{ActorPhase, AlarmState};
use quakewatch_kernel::cycle::{merge, parse_candidates, CycleOutcome, CycleParams};
use quakewatch_kernel::sampler::SourceSampler;
use quakewatch_kernel::types::EventRecord;

use crate::config::NodeConfig;
use crate::errors::EngineError;
use crate::source::CandidateSource;
use crate::storage::ActorStorage;
use crate::telemetry::{CYCLES_TOTAL, CYCLE_DURATION, RECORDS_EVICTED, RECORDS_SAMPLED, WINDOW_LEN};

pub type SharedActor = Arc<Mutex<WindowActor>>;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct ActorSettings {
    pub interval_ms: u64,
    pub limit: usize,
    pub pointer: String,
}

impl ActorSettings {
    pub fn from_config(cfg: &NodeConfig) -> Self {
        Self {
            interval_ms: cfg.alarm_interval_ms,
            limit: cfg.eq_limit,
            pointer: cfg.source.pointer.clone(),
        }
    }
}

pub struct WindowActor {
    storage: ActorStorage,
    source: CandidateSource,
    sampler: SourceSampler<StdRng>,
    settings: ActorSettings,
    alarm: AlarmState,
    running: bool,
    wake: Arc<Notify>,
}

impl WindowActor {
    pub async fn open(cfg: &NodeConfig, source: CandidateSource) -> Result<Self, EngineError> {
        let storage = ActorStorage::open(&cfg.state_dir, &cfg.actor_name).await?;
        Self::open_with(storage, source, ActorSettings::from_config(cfg), StdRng::from_entropy()).await
    }

    /// Restores the alarm from `storage`; the window itself is read lazily.
    pub async fn open_with(
        storage: ActorStorage,
        source: CandidateSource,
        settings: ActorSettings,
        rng: StdRng,
    ) -> Result<Self, EngineError> {
        let alarm = storage.load_alarm().await?;
        if let Some(wake) = alarm.next_wake() {
            tracing::info!("Restored pending alarm for {}", wake);
        }
        Ok(Self {
            storage,
            source,
            sampler: SourceSampler::new(rng, settings.limit),
            settings,
            alarm,
            running: false,
            wake: Arc::new(Notify::new()),
        })
    }

    pub fn into_shared(self) -> SharedActor {
        Arc::new(Mutex::new(self))
    }

    /// Signalled whenever the pending alarm changes.
    pub fn alarm_signal(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    pub fn alarm(&self) -> AlarmState {
        self.alarm
    }

    pub fn phase(&self) -> ActorPhase {
        ActorPhase::of(&self.alarm, self.running)
    }

    pub fn settings(&self) -> &ActorSettings {
        &self.settings
    }

    pub fn storage(&self) -> &ActorStorage {
        &self.storage
    }

    /// Enabling arms `now + interval` unless an alarm is already pending;
    /// disabling clears it. Redundant calls are no-ops. Returns `enabled`.
    pub async fn set_enabled(&mut self, enabled: bool, now_ms: u64) -> Result<bool, EngineError> {
        let mut next = self.alarm;
        let changed = if enabled {
            next.arm_if_absent(now_ms, self.settings.interval_ms)
        } else {
            next.disarm()
        };

        if changed {
            self.storage.store_alarm(&next).await?;
            self.alarm = next;
            self.wake.notify_one();
            match next.next_wake() {
                Some(wake) => tracing::info!("Alarm armed for {}", wake),
                None => tracing::info!("Alarm disarmed"),
            }
        }
        Ok(enabled)
    }

    /// Runs one refresh cycle and re-arms the alarm.
    ///
    /// Source problems (absent, unreadable, malformed) never skip the re-arm.
    /// A storage failure returns before re-arming and leaves the fired alarm
    /// pending, so the driver retries the whole invocation.
    pub async fn on_alarm(&mut self, now_ms: u64) -> Result<CycleOutcome, EngineError> {
        let started = Instant::now();
        let params = CycleParams::new(now_ms, self.settings.interval_ms, self.settings.limit);

        self.running = true;
        let result = self.refresh(params).await;
        self.running = false;

        let fatal = matches!(&result, Err(e) if e.is_fatal());
        match &result {
            Err(e) if fatal => {
                tracing::error!("Refresh cycle failed: {}", e);
                metrics::increment_counter!(CYCLES_TOTAL, "outcome" => "failed");
            }
            Err(e) => {
                tracing::error!("Refresh cycle aborted: {}", e);
                metrics::increment_counter!(CYCLES_TOTAL, "outcome" => "aborted");
            }
            Ok(outcome) => {
                metrics::increment_counter!(CYCLES_TOTAL, "outcome" => outcome.label());
            }
        }
        if fatal {
            return result;
        }

        let wake = self.rearm(now_ms).await?;
        tracing::debug!("Next refresh at {}", wake);
        metrics::histogram!(CYCLE_DURATION, started.elapsed().as_secs_f64());
        result
    }

    async fn refresh(&mut self, params: CycleParams) -> Result<CycleOutcome, EngineError> {
        let mut window = self.storage.load_window().await?;

        let raw = match self.source.fetch(params.now_ms).await? {
            Some(raw) => raw,
            None => {
                tracing::warn!(
                    "No source data at {}; window left unchanged",
                    self.source.key_for(params.now_ms)
                );
                return Ok(CycleOutcome::SourceAbsent);
            }
        };

        let candidates = parse_candidates(&raw, &self.settings.pointer)?;
        let plan = self.sampler.plan(candidates.len());
        let records = plan.ingest(&candidates, params.now_ms, params.ttl_ms());
        let report = merge(&mut window, records, params.limit);

        if report.evicted > 0 {
            tracing::debug!("Evicting {} records over limit {}", report.evicted, params.limit);
        }
        self.storage.store_window(&window).await?;

        tracing::info!(
            "Window committed: {} sampled from {} candidates, {} evicted, {} held",
            report.sampled,
            candidates.len(),
            report.evicted,
            report.len
        );
        metrics::counter!(RECORDS_SAMPLED, report.sampled as u64);
        metrics::counter!(RECORDS_EVICTED, report.evicted as u64);
        metrics::gauge!(WINDOW_LEN, report.len as f64);

        Ok(CycleOutcome::Committed(report))
    }

    async fn rearm(&mut self, now_ms: u64) -> Result<u64, EngineError> {
        let mut next = self.alarm;
        let wake = next.rearm(now_ms, self.settings.interval_ms);
        self.storage.store_alarm(&next).await?;
        self.alarm = next;
        self.wake.notify_one();
        Ok(wake)
    }

    /// Last persisted window, oldest first; empty if none.
    pub async fn current_window(&self) -> Result<Vec<EventRecord>, EngineError> {
        Ok(self.storage.load_window().await?.snapshot())
    }
}
