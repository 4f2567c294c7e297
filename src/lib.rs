//! # Peen
//!
//! `peen` is a DRAM row-hammer test sequencer. It drives an aggressive
//! read-access pattern against a set of configured memory rows through a
//! command/data port, verifies data integrity across the whole address range,
//! and reports mismatching addresses back to the host one at a time.
//!
//! This crate is a facade over the workspace members:
//!
//! - [`peen_core`] (re-exported at the root) - the step-driven sequencer core:
//!   configuration stores, write-fill, hammer, read-verify and error-report
//!   sequencers, and the phase orchestrator tying them together.
//! - `peen-sim` (behind the `sim` feature, re-exported as [`sim`]) - a
//!   simulated memory port and refresh control used by tests and the demo
//!   binary.
//!
//! The core never touches memory directly: all accesses go through the
//! [`port::MemoryPort`] and [`port::RefreshControl`] traits, so the same
//! sequencer drives a hardware register bus or a software simulation.

pub use peen_core::*;

/// Simulated memory port and refresh control.
#[cfg(feature = "sim")]
pub use peen_sim as sim;
