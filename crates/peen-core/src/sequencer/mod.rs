//! The per-phase sequencers.
//!
//! Each phase of a test run is its own state machine, stepped one transition
//! at a time by the orchestrator in [`tester`](crate::tester). All counters a
//! sequencer needs live on the sequencer instance itself; nothing is shared
//! between phases except through the orchestrator.

mod fill;
mod hammer;
mod report;
mod verify;

pub(crate) use self::fill::FillSequencer;
pub(crate) use self::hammer::HammerSequencer;
pub(crate) use self::report::ReportSequencer;
pub(crate) use self::verify::VerifySequencer;
