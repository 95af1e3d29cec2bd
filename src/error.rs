// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// The source blob is not valid JSON.
    #[error("source is not valid JSON: {0}")]
    SourceNotJson(String),
    /// The JSON pointer does not resolve to an array.
    #[error("source has no candidate array at {0}")]
    MissingCandidates(String),
    /// A candidate lacks a required field or has the wrong shape.
    #[error("candidate {index} is malformed: {reason}")]
    MalformedCandidate { index: usize, reason: String },
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
