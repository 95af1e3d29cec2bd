// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use axum::{
    extract::{Request as AxumRequest, State},
    http::{header::AUTHORIZATION, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use axum_extra::TypedHeader;
use headers::authorization::Bearer;
use headers::Authorization;
use tower_http::cors::{Any, CorsLayer};

use quakewatch_kernel::gate;

use crate::api::{StatusResponse, WindowResponse};
use crate::auth::JwksVerifier;
use crate::engine::{now_millis, SharedActor};
use crate::errors::EngineError;
use crate::telemetry::IDENTITY_DENIED;

#[derive(Clone)]
pub struct AppState {
    pub actor: SharedActor,
    pub verifier: Arc<JwksVerifier>,
    /// Feature flag: arms the refresh alarm and allows disclosure.
    pub live_window: bool,
}

/// Runs on every request: the feature flag decides whether the alarm is armed.
async fn feature_check(
    State(state): State<AppState>,
    req: AxumRequest,
    next: Next,
) -> Result<Response, EngineError> {
    {
        let mut actor = state.actor.lock().await;
        actor.set_enabled(state.live_window, now_millis()).await?;
    }
    Ok(next.run(req).await)
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([AUTHORIZATION]);

    if !state.live_window {
        tracing::warn!("Live window disabled: alarm stays off and queries return nothing");
    }

    Router::new()
        .route("/v1/window", get(query_window))
        .route("/v1/status", get(status))
        .route("/metrics", get(metrics_handler))
        .layer(from_fn_with_state(state.clone(), feature_check))
        .layer(cors)
        .with_state(state)
}

/// Verifies the bearer identity. Skipped entirely while the feature is off.
async fn identity_verified(state: &AppState, bearer: Option<TypedHeader<Authorization<Bearer>>>) -> bool {
    match bearer {
        Some(TypedHeader(Authorization(token))) if state.live_window => state.verifier.verify(token.token()).await,
        _ => false,
    }
}

async fn query_window(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<WindowResponse>, EngineError> {
    let verified = identity_verified(&state, bearer).await;
    if state.live_window && !verified {
        metrics::increment_counter!(IDENTITY_DENIED);
    }

    let window = state.actor.lock().await.current_window().await?;
    let earthquakes = gate::disclose(state.live_window, verified, window);
    Ok(Json(WindowResponse { earthquakes }))
}

/// Phase and schedule are public; the window size is gated like the window.
async fn status(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<StatusResponse>, EngineError> {
    let verified = identity_verified(&state, bearer).await;
    let actor = state.actor.lock().await;
    let window_len = if gate::allow(state.live_window, verified) {
        Some(actor.current_window().await?.len())
    } else {
        None
    };
    let alarm = actor.alarm();
    Ok(Json(StatusResponse {
        phase: actor.phase(),
        next_wake_ms: alarm.next_wake(),
        window_len,
        live_window: state.live_window,
    }))
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
