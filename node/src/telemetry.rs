// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const CYCLES_TOTAL: &str = "quakewatch_cycles_total";
pub const CYCLE_DURATION: &str = "quakewatch_cycle_duration_seconds";
pub const RECORDS_SAMPLED: &str = "quakewatch_records_sampled_total";
pub const RECORDS_EVICTED: &str = "quakewatch_records_evicted_total";
pub const WINDOW_LEN: &str = "quakewatch_window_len";
pub const IDENTITY_DENIED: &str = "quakewatch_identity_denied_total";

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() -> Result<(), BuildError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "quakewatch_node=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let handle = PrometheusBuilder::new().install_recorder()?;
    if PROM_HANDLE.set(handle).is_err() {
        tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
    }

    metrics::describe_counter!(CYCLES_TOTAL, "Refresh cycles by outcome");
    metrics::describe_histogram!(CYCLE_DURATION, "Time taken by a refresh cycle");
    metrics::describe_counter!(RECORDS_SAMPLED, "Records ingested into the window");
    metrics::describe_counter!(RECORDS_EVICTED, "Records evicted from the window");
    metrics::describe_gauge!(WINDOW_LEN, "Records currently held in the window");
    metrics::describe_counter!(IDENTITY_DENIED, "Window queries served empty because the identity was not verified");

    metrics::gauge!("quakewatch_node_up", 1.0);
    Ok(())
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
