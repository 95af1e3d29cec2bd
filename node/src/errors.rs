// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use quakewatch_kernel::error::KernelError;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Source malformed: {0}")]
    SourceMalformed(#[from] KernelError),
    #[error("Source fetch failed: {0}")]
    SourceFetch(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    /// Storage failures fail the whole invocation; every other cycle error is
    /// recovered by re-arming.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Storage(_))
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            EngineError::Storage(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Storage error: {}", e)),
            EngineError::SourceMalformed(e) => (StatusCode::BAD_GATEWAY, format!("Source malformed: {}", e)),
            EngineError::SourceFetch(msg) => (StatusCode::BAD_GATEWAY, msg),
            EngineError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
