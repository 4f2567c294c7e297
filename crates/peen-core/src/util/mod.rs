//! Utility types used throughout the Peen core.
//!
//! - [`EdgeDetector`] - turns a level signal into one event per rising edge
//! - [`RequestGate`] - edge detection plus the settle delay applied to every
//!   host-issued configuration request

mod edge;

pub use self::edge::{EdgeDetector, RequestGate};
