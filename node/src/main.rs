// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use quakewatch_node::auth::JwksVerifier;
use quakewatch_node::config::NodeConfig;
use quakewatch_node::engine::WindowActor;
use quakewatch_node::scheduler::{spawn_alarm_driver, RetryPolicy};
use quakewatch_node::server::{build_router, AppState};
use quakewatch_node::source::CandidateSource;
use quakewatch_node::telemetry::init_telemetry;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_telemetry()?;

    let cfg = NodeConfig::from_env()?;
    tracing::info!("Initializing QuakeWatch Node with config: {:?}", cfg);

    let source = CandidateSource::from_config(&cfg.source)?;
    let actor = WindowActor::open(&cfg, source).await?;
    let signal = actor.alarm_signal();
    let actor = actor.into_shared();

    let driver = spawn_alarm_driver(actor.clone(), signal, RetryPolicy::default());

    if cfg.auth.jwks_url.is_none() {
        tracing::warn!("No JWKS URL configured: every window query will be denied");
    }
    let state = AppState {
        actor,
        verifier: Arc::new(JwksVerifier::new(&cfg.auth)),
        live_window: cfg.live_window,
    };
    let app = build_router(state);

    let addr = cfg.bind_addr;
    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app).await;

    driver.abort();
    served?;
    Ok(())
}
