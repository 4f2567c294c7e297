//! Read-verify sequencer.
//!
//! Rescans the whole address range, comparing every response against the
//! pattern expected at that position, and accumulates a mismatch count.
//! Responses arrive in command order, so the beat index of a response is the
//! address it belongs to. Like the fill, command issue and response draining
//! interleave freely.

use log::{debug, warn};

use crate::config::PatternConfig;
use crate::port::{Command, MemoryPort, PortGeometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerifyState {
    /// First command not yet accepted.
    IssueRead,
    /// Commands and responses in flight simultaneously.
    IssueReadDrain,
    /// All commands issued; draining the remaining responses.
    DrainRemaining,
}

pub(crate) struct VerifySequencer {
    state: VerifyState,
    /// Next command address, 0..=max_address.
    address: u32,
    /// Responses processed so far; doubles as the expected-pattern index.
    responses: u32,
    max_address: u32,
    row_span: u32,
}

impl VerifySequencer {
    pub(crate) fn new(geometry: &PortGeometry) -> Self {
        VerifySequencer {
            state: VerifyState::IssueRead,
            address: 0,
            responses: 0,
            max_address: geometry.max_address(),
            row_span: geometry.row_span(),
        }
    }

    /// Advances one step, bumping `error_count` for each mismatch. Returns
    /// `true` once the response for the last address has been processed.
    pub(crate) fn step(
        &mut self,
        port: &mut dyn MemoryPort,
        patterns: &PatternConfig,
        double_pattern: bool,
        error_count: &mut u32,
    ) -> bool {
        // command stream
        if self.state != VerifyState::DrainRemaining && port.cmd_ready() {
            port.issue(Command {
                address: self.address,
                write: false,
            });
            if self.address == self.max_address {
                self.state = VerifyState::DrainRemaining;
            } else {
                self.address += 1;
                self.state = VerifyState::IssueReadDrain;
            }
        }

        // response stream
        if self.state != VerifyState::IssueRead {
            if let Some(word) = port.pop_read() {
                let expected = patterns.expected(self.responses, self.row_span, double_pattern);
                if word != expected {
                    *error_count += 1;
                    warn!(
                        "mismatch at address {:#x}: read {:#018x}, expected {:#018x}",
                        self.responses, word, expected
                    );
                }
                self.responses += 1;
                if self.responses == self.max_address + 1 {
                    debug!("verify pass complete, {} mismatch(es)", *error_count);
                    return true;
                }
            }
        }
        false
    }

    pub(crate) fn address(&self) -> u32 {
        self.address
    }

    pub(crate) fn sub_state(&self) -> u16 {
        match self.state {
            VerifyState::IssueRead => 0,
            VerifyState::IssueReadDrain => 1,
            VerifyState::DrainRemaining => 2,
        }
    }
}
