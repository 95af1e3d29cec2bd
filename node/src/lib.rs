// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod api;
pub mod auth;
pub mod engine;
pub mod scheduler;
pub mod server;
pub mod source;
pub mod storage;
pub mod telemetry;
