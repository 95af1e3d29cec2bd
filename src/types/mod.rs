// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Core data types.

pub mod candidate;
pub mod record;

pub use candidate::Candidate;
pub use record::EventRecord;
