// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Bearer identity verification against a published JWKS.
//!
//! `verify` never fails: every problem (no key set, fetch error, bad
//! signature, expired token, missing claim) collapses to `false`.

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::AuthConfig;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no key set configured")]
    NoKeySet,
    #[error("key set fetch failed: {0}")]
    Fetch(String),
    #[error("token rejected: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("no key matches kid {0:?}")]
    UnknownKey(Option<String>),
    #[error("token algorithm {token:?} does not match key algorithm {key:?}")]
    AlgorithmMismatch { token: Algorithm, key: Algorithm },
    #[error("key is not usable for signatures")]
    UnusableKey,
    #[error("claim {0} does not list this application")]
    MissingClaim(String),
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Option<Instant>,
}

pub struct JwksVerifier {
    jwks_url: Option<String>,
    client: Client,
    ttl: Duration,
    app_id: String,
    app_claim: String,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksVerifier {
    pub fn new(cfg: &AuthConfig) -> Self {
        Self {
            jwks_url: cfg.jwks_url.as_ref().map(|u| u.trim_end_matches('/').to_string()),
            client: Client::new(),
            ttl: cfg.jwks_ttl,
            app_id: cfg.app_id.clone(),
            app_claim: cfg.app_claim.clone(),
            cache: RwLock::new(None),
        }
    }

    /// Verifier pinned to a fixed key set; never goes to the network.
    pub fn with_keys(keys: JwkSet, app_id: impl Into<String>, app_claim: impl Into<String>) -> Self {
        Self {
            jwks_url: None,
            client: Client::new(),
            ttl: Duration::MAX,
            app_id: app_id.into(),
            app_claim: app_claim.into(),
            cache: RwLock::new(Some(CachedKeys {
                keys,
                fetched_at: None,
            })),
        }
    }

    pub async fn verify(&self, token: &str) -> bool {
        match self.try_verify(token).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Identity rejected: {}", e);
                false
            }
        }
    }

    pub async fn try_verify(&self, token: &str) -> Result<(), AuthError> {
        let header = decode_header(token)?;
        let jwk = self.find_key(header.kid.as_deref()).await?;
        let key = DecodingKey::from_jwk(&jwk)?;

        let mut validation = Validation::new(pinned_algorithm(&jwk, header.alg)?);
        validation.validate_aud = false;
        let data = decode::<Map<String, Value>>(token, &key, &validation)?;

        let listed = data
            .claims
            .get(&self.app_claim)
            .and_then(Value::as_array)
            .map(|apps| apps.iter().any(|app| app.as_str() == Some(self.app_id.as_str())))
            .unwrap_or(false);
        if listed {
            Ok(())
        } else {
            Err(AuthError::MissingClaim(self.app_claim.clone()))
        }
    }

    async fn find_key(&self, kid: Option<&str>) -> Result<Jwk, AuthError> {
        if let Some(jwk) = self.cached_key(kid, false).await {
            return Ok(jwk);
        }
        if self.jwks_url.is_none() {
            return match self.cache.read().await.as_ref() {
                Some(_) => Err(AuthError::UnknownKey(kid.map(str::to_string))),
                None => Err(AuthError::NoKeySet),
            };
        }

        // Stale cache or a rotated key: refetch once.
        self.refresh().await?;
        self.cached_key(kid, true)
            .await
            .ok_or_else(|| AuthError::UnknownKey(kid.map(str::to_string)))
    }

    async fn cached_key(&self, kid: Option<&str>, allow_stale: bool) -> Option<Jwk> {
        let guard = self.cache.read().await;
        let cached = guard.as_ref()?;
        let fresh = cached
            .fetched_at
            .map(|at| at.elapsed() < self.ttl)
            .unwrap_or(true);
        if !fresh && !allow_stale {
            return None;
        }
        match kid {
            Some(kid) => cached.keys.find(kid).cloned(),
            None if cached.keys.keys.len() == 1 => cached.keys.keys.first().cloned(),
            None => None,
        }
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        let url = self.jwks_url.as_deref().ok_or(AuthError::NoKeySet)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::Fetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AuthError::Fetch(format!("key set request failed: {}", resp.status())));
        }
        let keys: JwkSet = resp.json().await.map_err(|e| AuthError::Fetch(e.to_string()))?;

        tracing::info!("Fetched {} signing keys from {}", keys.keys.len(), url);
        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Some(Instant::now()),
        });
        Ok(())
    }
}

/// The key's own `alg` wins over the token header when the key declares one.
fn pinned_algorithm(jwk: &Jwk, token_alg: Algorithm) -> Result<Algorithm, AuthError> {
    let Some(declared) = &jwk.common.key_algorithm else {
        return Ok(token_alg);
    };
    let key_alg = match declared {
        KeyAlgorithm::HS256 => Algorithm::HS256,
        KeyAlgorithm::HS384 => Algorithm::HS384,
        KeyAlgorithm::HS512 => Algorithm::HS512,
        KeyAlgorithm::ES256 => Algorithm::ES256,
        KeyAlgorithm::ES384 => Algorithm::ES384,
        KeyAlgorithm::RS256 => Algorithm::RS256,
        KeyAlgorithm::RS384 => Algorithm::RS384,
        KeyAlgorithm::RS512 => Algorithm::RS512,
        KeyAlgorithm::PS256 => Algorithm::PS256,
        KeyAlgorithm::PS384 => Algorithm::PS384,
        KeyAlgorithm::PS512 => Algorithm::PS512,
        KeyAlgorithm::EdDSA => Algorithm::EdDSA,
        // Encryption-only algorithms
        _ => return Err(AuthError::UnusableKey),
    };
    if key_alg != token_alg {
        return Err(AuthError::AlgorithmMismatch {
            token: token_alg,
            key: key_alg,
        });
    }
    Ok(key_alg)
}
