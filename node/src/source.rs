// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Candidate batches from the object store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use opendal::{services, ErrorKind, Operator};

use crate::config::{SourceBackend, SourceConfig};
use crate::errors::EngineError;

#[derive(Debug, Clone)]
pub struct CandidateSource {
    op: Operator,
    key_template: String,
    fetch_timeout: Duration,
}

impl CandidateSource {
    pub fn new(op: Operator, key_template: impl Into<String>, fetch_timeout: Duration) -> Self {
        Self {
            op,
            key_template: key_template.into(),
            fetch_timeout,
        }
    }

    pub fn from_config(cfg: &SourceConfig) -> Result<Self, EngineError> {
        let op = build_operator(&cfg.backend)
            .map_err(|e| EngineError::InvalidInput(format!("Failed to open source: {}", e)))?;
        Ok(Self::new(op, cfg.key_template.clone(), cfg.fetch_timeout))
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Object key for the period containing `now_ms`.
    pub fn key_for(&self, now_ms: u64) -> String {
        let at: DateTime<Utc> = i64::try_from(now_ms)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_default();
        self.key_template
            .replace("{date}", &at.format("%Y-%m-%d").to_string())
    }

    /// Reads the batch for the period containing `now_ms`.
    ///
    /// A missing or empty object is `Ok(None)`. Any other failure, a timeout
    /// included, is `SourceFetch`.
    pub async fn fetch(&self, now_ms: u64) -> Result<Option<Vec<u8>>, EngineError> {
        let key = self.key_for(now_ms);
        let read = tokio::time::timeout(self.fetch_timeout, self.op.read(&key)).await;

        match read {
            Err(_) => Err(EngineError::SourceFetch(format!(
                "Timed out after {:?} reading {}",
                self.fetch_timeout, key
            ))),
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Source object {} not found", key);
                Ok(None)
            }
            Ok(Err(e)) => Err(EngineError::SourceFetch(format!("Failed to read {}: {}", key, e))),
            Ok(Ok(buf)) => {
                let bytes = buf.to_vec();
                if bytes.is_empty() {
                    tracing::debug!("Source object {} is empty", key);
                    Ok(None)
                } else {
                    Ok(Some(bytes))
                }
            }
        }
    }
}

fn build_operator(backend: &SourceBackend) -> opendal::Result<Operator> {
    let op = match backend {
        SourceBackend::Fs(root) => {
            let builder = services::Fs::default().root(&root.to_string_lossy());
            Operator::new(builder)?.finish()
        }
        SourceBackend::S3 {
            bucket,
            region,
            endpoint,
        } => {
            let mut builder = services::S3::default().bucket(bucket);
            if let Some(region) = region {
                builder = builder.region(region);
            }
            if let Some(endpoint) = endpoint {
                builder = builder.endpoint(endpoint);
            }
            Operator::new(builder)?.finish()
        }
        SourceBackend::Memory => Operator::new(services::Memory::default())?.finish(),
    };
    Ok(op)
}
