//! Write-fill sequencer.
//!
//! Streams write commands across the whole address range to initialize the
//! memory with a known pattern. Commands and write-data beats travel on
//! independent handshakes: the command address may run ahead of the data
//! stream, but a beat is only offered for a write whose command has already
//! been accepted. The phase is only complete once the number of accepted
//! data beats equals the number of addresses.

use log::{debug, trace};

use crate::config::PatternConfig;
use crate::port::{Command, MemoryPort, PortGeometry, WriteBeat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillState {
    /// First command not yet accepted; no data pushed.
    IssueWrite,
    /// Commands and data beats in flight simultaneously.
    IssueWriteDrain,
    /// All commands issued; draining the remaining data beats.
    DrainRemaining,
}

pub(crate) struct FillSequencer {
    state: FillState,
    /// Next command address, 0..=max_address.
    address: u32,
    /// Write-data beats accepted so far.
    beats: u32,
    max_address: u32,
    row_span: u32,
}

impl FillSequencer {
    pub(crate) fn new(geometry: &PortGeometry) -> Self {
        debug!(
            "write fill: {} words, row span {}",
            geometry.word_count(),
            geometry.row_span()
        );
        FillSequencer {
            state: FillState::IssueWrite,
            address: 0,
            beats: 0,
            max_address: geometry.max_address(),
            row_span: geometry.row_span(),
        }
    }

    /// Advances one step. Returns `true` once every word has been written.
    pub(crate) fn step(
        &mut self,
        port: &mut dyn MemoryPort,
        patterns: &PatternConfig,
        double_pattern: bool,
    ) -> bool {
        // command stream
        if self.state != FillState::DrainRemaining && port.cmd_ready() {
            port.issue(Command {
                address: self.address,
                write: true,
            });
            if self.address == self.max_address {
                self.state = FillState::DrainRemaining;
            } else {
                self.address += 1;
                self.state = FillState::IssueWriteDrain;
            }
        }

        // data stream, never ahead of the commands actually accepted
        let issued = if self.state == FillState::DrainRemaining {
            self.max_address + 1
        } else {
            self.address
        };
        if self.state != FillState::IssueWrite && port.wdata_ready() && self.beats < issued {
            let data = patterns.expected(self.beats, self.row_span, double_pattern);
            port.push_write(WriteBeat::full(data));
            trace!("fill beat {} data {:#018x}", self.beats, data);
            self.beats += 1;
            if self.beats == self.max_address + 1 {
                debug!("write fill complete after {} beats", self.beats);
                return true;
            }
        }
        false
    }

    pub(crate) fn address(&self) -> u32 {
        self.address
    }

    pub(crate) fn sub_state(&self) -> u16 {
        match self.state {
            FillState::IssueWrite => 0,
            FillState::IssueWriteDrain => 1,
            FillState::DrainRemaining => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Word;

    /// Port whose command channel only accepts every third tick while the
    /// data channel stays ready throughout.
    struct StutterPort {
        commands: Vec<Command>,
        beats: Vec<WriteBeat>,
        ticks: u64,
    }

    impl MemoryPort for StutterPort {
        fn cmd_ready(&self) -> bool {
            self.ticks % 3 == 0
        }
        fn issue(&mut self, cmd: Command) {
            assert!(cmd.write);
            self.commands.push(cmd);
        }
        fn wdata_ready(&self) -> bool {
            true
        }
        fn push_write(&mut self, beat: WriteBeat) {
            self.beats.push(beat);
        }
        fn pop_read(&mut self) -> Option<Word> {
            None
        }
        fn tick(&mut self) {
            self.ticks += 1;
        }
    }

    #[test]
    fn test_beats_never_outrun_commands() {
        let geometry = PortGeometry::new(6, 1, 2);
        let patterns = PatternConfig::default();
        let mut port = StutterPort {
            commands: vec![],
            beats: vec![],
            ticks: 0,
        };
        let mut seq = FillSequencer::new(&geometry);

        let mut done = false;
        for _ in 0..10_000 {
            assert!(
                port.beats.len() <= port.commands.len(),
                "data beat accepted without a matching write command"
            );
            if seq.step(&mut port, &patterns, false) {
                done = true;
                break;
            }
            port.tick();
        }
        assert!(done, "fill never completed");

        // every address got its command and its beat, despite the stalls
        assert_eq!(port.commands.len() as u32, geometry.word_count());
        assert_eq!(port.beats.len() as u32, geometry.word_count());
        let addresses: Vec<u32> = port.commands.iter().map(|cmd| cmd.address).collect();
        let expected: Vec<u32> = (0..geometry.word_count()).collect();
        assert_eq!(addresses, expected);
    }
}
