// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Durable actor storage.
//!
//! Every actor owns one directory (`<root>/<actor>`) and every key is one file
//! in it. A value is framed as
//!
//! ```text
//! [MAGIC u32][VERSION u32][LEN u32][JSON ...][CRC32 u32]
//! ```
//!
//! and replaced by writing a temp file, fsyncing it and renaming it over the
//! old one, so a reader sees either the previous or the new value.

use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use quakewatch_kernel::alarm::AlarmState;
use quakewatch_kernel::buffer::BoundedEventBuffer;
use quakewatch_kernel::config::{ALARM_KEY, WINDOW_KEY};

const MAGIC: u32 = 0x5155_4B57; // QUKW
const SCHEMA_VERSION: u32 = 1;
const HEADER_LEN: usize = 12;
const TRAILER_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Corrupted value for key {key}: {reason}")]
    Corrupted { key: String, reason: String },
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone)]
pub struct ActorStorage {
    dir: PathBuf,
}

impl ActorStorage {
    /// Opens (creating if needed) the storage directory of `actor` under `root`.
    pub async fn open(root: &Path, actor: &str) -> Result<Self, StorageError> {
        validate_key(actor)?;
        let dir = root.join(actor);
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!("Actor storage opened at {:?}", dir);
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.state", key))
    }

    /// Reads `key`. A missing file is `Ok(None)`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        validate_key(key)?;
        let data = match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let payload = unframe(key, &data)?;
        Ok(Some(serde_json::from_slice(payload)?))
    }

    /// Atomically replaces `key` with `value`.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        validate_key(key)?;
        let framed = frame(&serde_json::to_vec(value)?)?;
        let path = self.path_for(key);
        let tmp_path = path.with_extension("tmp");

        {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&framed).await?;
            file.sync_all().await?;
        }

        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn load_window(&self) -> Result<BoundedEventBuffer, StorageError> {
        Ok(self.get(WINDOW_KEY).await?.unwrap_or_default())
    }

    pub async fn store_window(&self, window: &BoundedEventBuffer) -> Result<(), StorageError> {
        self.put(WINDOW_KEY, window).await
    }

    pub async fn load_alarm(&self) -> Result<AlarmState, StorageError> {
        Ok(self.get(ALARM_KEY).await?.unwrap_or_default())
    }

    /// A disarmed alarm is stored as the absence of the key.
    pub async fn store_alarm(&self, alarm: &AlarmState) -> Result<(), StorageError> {
        if alarm.is_armed() {
            self.put(ALARM_KEY, alarm).await
        } else {
            self.delete(ALARM_KEY).await
        }
    }
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

fn frame(payload: &[u8]) -> Result<Vec<u8>, StorageError> {
    let len = u32::try_from(payload.len()).map_err(|_| StorageError::Corrupted {
        key: String::new(),
        reason: format!("value of {} bytes is too large", payload.len()),
    })?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);

    let mut hasher = Hasher::new();
    hasher.update(&out);
    out.extend_from_slice(&hasher.finalize().to_le_bytes());
    Ok(out)
}

fn unframe<'a>(key: &str, data: &'a [u8]) -> Result<&'a [u8], StorageError> {
    let corrupted = |reason: &str| StorageError::Corrupted {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if data.len() < HEADER_LEN + TRAILER_LEN {
        return Err(corrupted("too short"));
    }

    let (content, trailer) = data.split_at(data.len() - TRAILER_LEN);
    let stored_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let mut hasher = Hasher::new();
    hasher.update(content);
    if hasher.finalize() != stored_crc {
        return Err(corrupted("checksum mismatch"));
    }

    let word = |at: usize| u32::from_le_bytes([content[at], content[at + 1], content[at + 2], content[at + 3]]);
    if word(0) != MAGIC {
        return Err(corrupted("invalid magic"));
    }
    if word(4) != SCHEMA_VERSION {
        return Err(corrupted("version mismatch"));
    }

    let len = word(8) as usize;
    let payload = &content[HEADER_LEN..];
    if payload.len() != len {
        return Err(corrupted("length mismatch"));
    }
    Ok(payload)
}
