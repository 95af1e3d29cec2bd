// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! quakewatch-kernel: the bounded earthquake window and the state machine
//! that keeps it fresh. Pure and synchronous; the host supplies storage,
//! the source blob, the clock and the RNG.

pub mod config;
pub mod error;
pub mod types;
pub mod buffer;
pub mod sampler;
pub mod cycle;
pub mod alarm;
pub mod gate;

#[cfg(test)]
pub mod tests;
