//! Edge detection for host control pulses.
//!
//! The hardware this core descends from debounced every cross-boundary pulse
//! with a two-stage synchronizer and a one-shot latch, replicated per field.
//! Here the same contract - each host pulse triggers exactly one action - is
//! kept by detecting edges once at the core's input boundary.

/// Turns a sampled level into one event per rising edge.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    last: bool,
}

impl EdgeDetector {
    /// Samples the level; returns `true` exactly once per low-to-high
    /// transition.
    pub fn rising(&mut self, level: bool) -> bool {
        let edge = level && !self.last;
        self.last = level;
        edge
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    Settling(u32),
    Fired,
}

/// One-shot request gate with a settle delay.
///
/// A configuration request is honored only after its start level has been
/// held high for a fixed number of ticks. The gate fires exactly once per
/// assertion; the acknowledge output stays high until the host releases the
/// start level, which re-arms the gate.
#[derive(Debug)]
pub struct RequestGate {
    settle_ticks: u32,
    state: GateState,
}

impl RequestGate {
    /// Creates a gate with the given settle delay in ticks.
    pub fn new(settle_ticks: u32) -> Self {
        RequestGate {
            settle_ticks,
            state: GateState::Idle,
        }
    }

    /// Samples the start level for one tick.
    ///
    /// Returns `true` on the single tick the request should be acted upon.
    pub fn poll(&mut self, level: bool) -> bool {
        if !level {
            self.state = GateState::Idle;
            return false;
        }
        match self.state {
            GateState::Idle => {
                self.state = if self.settle_ticks == 0 {
                    GateState::Fired
                } else {
                    GateState::Settling(self.settle_ticks - 1)
                };
                self.settle_ticks == 0
            }
            GateState::Settling(0) => {
                self.state = GateState::Fired;
                true
            }
            GateState::Settling(left) => {
                self.state = GateState::Settling(left - 1);
                false
            }
            GateState::Fired => false,
        }
    }

    /// Whether the request has been acted upon and the start level is still
    /// held. Mirrored to the host as the acknowledge status.
    pub fn acked(&self) -> bool {
        self.state == GateState::Fired
    }
}
