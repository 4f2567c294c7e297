//! # Peen Core
//!
//! `peen-core` is the sequencer core of the Peen DRAM row-hammer tester. It
//! models the test engine that sits next to a memory controller's native
//! port: a set of step-driven sequencers that fill the memory with a known
//! pattern, hammer configured aggressor rows, rescan for bit flips, and
//! replay every flipped word to the host.
//!
//! ## Architecture Overview
//!
//! The core is built around two traits that define its seams:
//!
//! - [`port::MemoryPort`] - The controller's native port: command, write-data
//!   and read-data channels with independent ready/valid handshakes. The core
//!   never owns memory; every access goes through a port implementation.
//!
//! - [`port::RefreshControl`] - Refresh interval, refresh enable and
//!   auto-precharge state owned by the controller. The core overrides them
//!   for the duration of the hammer phase and restores them afterwards.
//!
//! ## Main Components
//!
//! - [`RowHammerTester`] - The phase orchestrator. One call to
//!   [`step()`](RowHammerTester::step) advances the whole core by one tick.
//!
//! - [`Registers`] - The host-visible register surface: configuration
//!   requests, run control, status feedback and error reporting all travel
//!   through its fields.
//!
//! - [`HostDriver`] - A host-side wrapper that speaks the level/acknowledge
//!   protocol of the register surface and collects run results into a
//!   serializable [`RunSummary`].
//!
//! ## Driving the core
//!
//! The core is fully deterministic and makes no assumptions about time: the
//! caller ticks the tester and the port in lock-step, whether that caller is
//! a unit test, a simulation harness or a bridge to real hardware.

#![warn(missing_docs)]

pub mod config;
pub mod host;
pub mod pattern;
pub mod port;
pub mod registers;
mod sequencer;
mod tester;
pub mod util;

pub use crate::config::{ConfigError, PatternConfig, TargetConfig, TargetRow};
pub use crate::host::{ErrorReport, HostDriver, HostError, RunSummary};
pub use crate::port::{Command, MemoryPort, PortGeometry, RefreshControl, WriteBeat};
pub use crate::registers::{Registers, feedback};
pub use crate::tester::{DEFAULT_SETTLE_TICKS, RowHammerTester};
