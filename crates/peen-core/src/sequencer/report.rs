//! Error-report sequencer.
//!
//! After a verify pass that counted mismatches, the report phase re-walks the
//! address range one address at a time: issue a read, receive the datum, and
//! hold it for the host. Addresses whose datum matches the expected pattern
//! (the mismatch was transient) advance on their own; a genuine mismatch
//! raises the found flag, exposes the datum in 32-bit chunks, and blocks
//! until the host pulses the acknowledge signal.

use log::{debug, info};

use crate::config::PatternConfig;
use crate::pattern::{Word, word_chunks};
use crate::port::{Command, MemoryPort, PortGeometry};
use crate::registers::Registers;
use crate::util::EdgeDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportState {
    IssueRead,
    Receive,
    Display,
}

pub(crate) struct ReportSequencer {
    state: ReportState,
    /// Address under replay, 0..=max_address.
    address: u32,
    /// Datum received for the current address.
    datum: Word,
    ack_edge: EdgeDetector,
    max_address: u32,
    row_span: u32,
}

impl ReportSequencer {
    pub(crate) fn new(geometry: &PortGeometry) -> Self {
        ReportSequencer {
            state: ReportState::IssueRead,
            address: 0,
            datum: 0,
            ack_edge: EdgeDetector::default(),
            max_address: geometry.max_address(),
            row_span: geometry.row_span(),
        }
    }

    /// Advances one step. Returns `true` once the replay has covered the
    /// whole address range.
    pub(crate) fn step(
        &mut self,
        port: &mut dyn MemoryPort,
        patterns: &PatternConfig,
        double_pattern: bool,
        regs: &mut Registers,
    ) -> bool {
        // the acknowledge one-shot runs every tick so a level held across
        // states yields exactly one event
        let ack = self.ack_edge.rising(regs.error_ack);
        regs.error_ack_seen = regs.error_ack;

        match self.state {
            ReportState::IssueRead => {
                if port.cmd_ready() {
                    port.issue(Command {
                        address: self.address,
                        write: false,
                    });
                    self.state = ReportState::Receive;
                }
            }
            ReportState::Receive => {
                if let Some(word) = port.pop_read() {
                    self.datum = word;
                    self.state = ReportState::Display;
                }
            }
            ReportState::Display => {
                let expected = patterns.expected(self.address, self.row_span, double_pattern);
                if self.datum == expected {
                    // transient mismatch, nothing to hold for the host
                    regs.error_found = false;
                    return self.next(regs);
                }
                if ack {
                    debug!("error at {:#x} acknowledged", self.address);
                    regs.error_found = false;
                    return self.next(regs);
                }
                if !regs.error_found {
                    info!(
                        "holding error at {:#x}: read {:#018x}, expected {:#018x}",
                        self.address, self.datum, expected
                    );
                }
                regs.error_found = true;
                regs.error_data = word_chunks(self.datum);
            }
        }
        false
    }

    fn next(&mut self, regs: &mut Registers) -> bool {
        if self.address == self.max_address {
            return true;
        }
        self.address += 1;
        regs.scan_address = self.address;
        self.state = ReportState::IssueRead;
        false
    }

    pub(crate) fn address(&self) -> u32 {
        self.address
    }

    pub(crate) fn sub_state(&self) -> u16 {
        match self.state {
            ReportState::IssueRead => 0,
            ReportState::Receive => 1,
            ReportState::Display => 2,
        }
    }
}
