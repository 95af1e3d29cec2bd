// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use quakewatch_kernel::config::{ALARM_INTERVAL_MS, EQ_LIMIT};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where candidate batches are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceBackend {
    Fs(PathBuf),
    S3 {
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
    },
    Memory,
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub backend: SourceBackend,
    /// Object key; `{date}` is replaced with the cycle's UTC date.
    pub key_template: String,
    /// JSON pointer to the candidate array inside the blob.
    pub pointer: String,
    pub fetch_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            backend: SourceBackend::Fs(PathBuf::from("./data/source")),
            key_template: "earthquakes/{date}.json".to_string(),
            pointer: "/data/earthquakes".to_string(),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Published key set. Without one no identity can be verified.
    pub jwks_url: Option<String>,
    pub app_id: String,
    /// Claim that must be an array containing `app_id`.
    pub app_claim: String,
    pub jwks_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwks_url: None,
            app_id: "quakewatch".to_string(),
            app_claim: "apps".to_string(),
            jwks_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    pub state_dir: PathBuf,
    pub actor_name: String,
    pub alarm_interval_ms: u64,
    pub eq_limit: usize,
    /// Feature flag gating both the refresh alarm and window disclosure.
    pub live_window: bool,
    pub source: SourceConfig,
    pub auth: AuthConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            state_dir: PathBuf::from("./data/state"),
            actor_name: "quakes".to_string(),
            alarm_interval_ms: ALARM_INTERVAL_MS,
            eq_limit: EQ_LIMIT,
            live_window: false,
            source: SourceConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies `QUAKEWATCH_*` overrides on top of the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("QUAKEWATCH_BIND_ADDR") {
            cfg.bind_addr = parse("QUAKEWATCH_BIND_ADDR", v)?;
        }
        if let Some(v) = lookup("QUAKEWATCH_STATE_DIR") {
            cfg.state_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("QUAKEWATCH_ACTOR") {
            if v.is_empty() || v.contains(['/', '\\']) || v == "." || v == ".." {
                return Err(invalid("QUAKEWATCH_ACTOR", v, "must be a plain directory name"));
            }
            cfg.actor_name = v;
        }
        if let Some(v) = lookup("QUAKEWATCH_ALARM_INTERVAL_MS") {
            let interval: u64 = parse("QUAKEWATCH_ALARM_INTERVAL_MS", v.clone())?;
            if interval == 0 {
                return Err(invalid("QUAKEWATCH_ALARM_INTERVAL_MS", v, "must be greater than zero"));
            }
            cfg.alarm_interval_ms = interval;
        }
        if let Some(v) = lookup("QUAKEWATCH_EQ_LIMIT") {
            cfg.eq_limit = parse("QUAKEWATCH_EQ_LIMIT", v)?;
        }
        if let Some(v) = lookup("QUAKEWATCH_LIVE_WINDOW") {
            cfg.live_window = parse_flag("QUAKEWATCH_LIVE_WINDOW", v)?;
        }

        if let Some(v) = lookup("QUAKEWATCH_SOURCE") {
            cfg.source.backend = parse_backend(
                v,
                lookup("QUAKEWATCH_S3_REGION"),
                lookup("QUAKEWATCH_S3_ENDPOINT"),
            )?;
        }
        if let Some(v) = lookup("QUAKEWATCH_SOURCE_KEY") {
            cfg.source.key_template = v;
        }
        if let Some(v) = lookup("QUAKEWATCH_SOURCE_POINTER") {
            if !v.is_empty() && !v.starts_with('/') {
                return Err(invalid("QUAKEWATCH_SOURCE_POINTER", v, "JSON pointer must start with '/'"));
            }
            cfg.source.pointer = v;
        }
        if let Some(v) = lookup("QUAKEWATCH_FETCH_TIMEOUT_MS") {
            cfg.source.fetch_timeout = Duration::from_millis(parse("QUAKEWATCH_FETCH_TIMEOUT_MS", v)?);
        }

        if let Some(v) = lookup("QUAKEWATCH_JWKS_URL") {
            cfg.auth.jwks_url = Some(v);
        }
        if let Some(v) = lookup("QUAKEWATCH_APP_ID") {
            cfg.auth.app_id = v;
        }
        if let Some(v) = lookup("QUAKEWATCH_APP_CLAIM") {
            cfg.auth.app_claim = v;
        }
        if let Some(v) = lookup("QUAKEWATCH_JWKS_TTL_SECS") {
            cfg.auth.jwks_ttl = Duration::from_secs(parse("QUAKEWATCH_JWKS_TTL_SECS", v)?);
        }

        Ok(cfg)
    }
}

fn invalid(key: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value,
        reason: reason.into(),
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        let reason = e.to_string();
        invalid(key, value, reason)
    })
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected a boolean")),
    }
}

fn parse_backend(
    value: String,
    region: Option<String>,
    endpoint: Option<String>,
) -> Result<SourceBackend, ConfigError> {
    if value == "memory" {
        return Ok(SourceBackend::Memory);
    }
    match value.split_once(':') {
        Some(("fs", root)) if !root.is_empty() => Ok(SourceBackend::Fs(PathBuf::from(root))),
        Some(("s3", bucket)) if !bucket.is_empty() => Ok(SourceBackend::S3 {
            bucket: bucket.to_string(),
            region,
            endpoint,
        }),
        _ => Err(invalid(
            "QUAKEWATCH_SOURCE",
            value,
            "expected fs:<root>, s3:<bucket> or memory",
        )),
    }
}
