//! Simulated memory port for testing.
//!
//! This crate provides a [`peen_core::MemoryPort`] implementation backed by a
//! plain vector, with configurable read latency and randomized channel
//! backpressure, plus a matching [`peen_core::RefreshControl`]. Useful for
//! exercising the sequencer core without hardware access.
//!
//! # Use Cases
//!
//! - Integration testing of the Peen core
//! - Injecting bit flips to exercise the verify and report phases
//! - Inspecting the exact command stream a run produces

#![warn(missing_docs)]

mod sim;

pub use sim::{Backpressure, DEFAULT_REFRESH_INTERVAL, SimPort, SimRefresh};
