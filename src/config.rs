// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

/// Maximum number of records retained in the window (and the exclusive upper
/// bound of a single cycle's sample count).
pub const EQ_LIMIT: usize = 10;

/// Delay between two refresh cycles, in milliseconds.
pub const ALARM_INTERVAL_MS: u64 = 30 * 1000;

/// Records expire this many intervals after ingestion.
pub const EXPIRY_INTERVALS: u64 = 2;

/// Durable storage key holding the window.
pub const WINDOW_KEY: &str = "earthquakes";

/// Durable storage key holding the alarm.
pub const ALARM_KEY: &str = "alarm";
