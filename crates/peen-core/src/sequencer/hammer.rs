//! Hammer sequencer.
//!
//! Visits the configured target rows in slot order, issuing the per-row
//! number of read accesses, organized as a nested loop: an outer cycle repeat
//! around the whole ordered visit, and pair repeats that revisit each pair of
//! the first ten slots before the walk advances past it. Slots beyond the
//! tenth are visited with a single access and take no part in pair repeats.
//!
//! The hardware ancestor unrolled this loop into twenty near-identical
//! states; here a single state iterates over the target descriptors, which
//! also resolves the copy-paste drift those states had accumulated (one of
//! them stepped its remaining-rows counter in the wrong direction). The
//! contract implemented is: every cycle visits exactly `active_count` rows in
//! slot order, and pair `i` is walked `pair_repeat[i]` times in a row before
//! the sequencer moves on.
//!
//! A signed credit counter tracks commands accepted against responses seen;
//! the phase may only be left once the credit has drained back to zero.

use log::{debug, trace};

use crate::config::{FREQ_TARGETS, MAX_TARGETS, PatternConfig, TargetConfig};
use crate::port::{Command, MemoryPort};

pub(crate) struct HammerSequencer {
    /// Slot currently under attack.
    slot: usize,
    /// Read accesses still owed to the current slot visit.
    freq_left: u32,
    /// Walks of the current pair still owed, including the one in progress.
    pair_repeats_left: u32,
    /// Full ordered visits still owed, including the one in progress.
    cycles_left: u32,
    /// Slots this run visits per cycle.
    active: usize,
    /// Commands accepted minus responses received.
    credit: i64,
}

impl HammerSequencer {
    pub(crate) fn new(targets: &TargetConfig, patterns: &PatternConfig) -> Self {
        let active = (targets.active_count() as usize).min(MAX_TARGETS);
        debug!(
            "hammer: {} rows, {} cycle(s)",
            active,
            patterns.cycle_repeat()
        );
        HammerSequencer {
            slot: 0,
            freq_left: targets.frequency(0),
            pair_repeats_left: patterns.pair_repeat(0),
            cycles_left: patterns.cycle_repeat(),
            active,
            credit: 0,
        }
    }

    /// Advances one step. Returns `true` once the last access of the last
    /// cycle has been accepted; outstanding responses then drain via
    /// [`drain()`](Self::drain).
    pub(crate) fn step(
        &mut self,
        port: &mut dyn MemoryPort,
        targets: &TargetConfig,
        patterns: &PatternConfig,
    ) -> bool {
        if port.pop_read().is_some() {
            self.credit -= 1;
        }
        if !port.cmd_ready() {
            return false;
        }
        let address = targets.address(self.slot);
        port.issue(Command {
            address,
            write: false,
        });
        self.credit += 1;
        trace!("hammer slot {} address {:#x}", self.slot, address);
        self.freq_left -= 1;
        if self.freq_left > 0 {
            return false;
        }
        let done = self.advance(targets, patterns);
        if done {
            debug!("hammer issue complete, credit {}", self.credit);
        }
        done
    }

    /// Moves to the next slot visit once the current slot's accesses have
    /// all been accepted. Returns `true` when the whole walk is over.
    fn advance(&mut self, targets: &TargetConfig, patterns: &PatternConfig) -> bool {
        let paired = self.active.min(FREQ_TARGETS);
        if self.slot < paired {
            let pair_start = self.slot & !1;
            let pair_end = (pair_start + 2).min(paired);
            if self.slot + 1 < pair_end {
                // second member of the pair, same walk
                self.slot += 1;
            } else if self.pair_repeats_left > 1 {
                // walk the pair again from its first member
                self.pair_repeats_left -= 1;
                self.slot = pair_start;
            } else if pair_end < paired {
                // next pair
                self.slot = pair_end;
                self.pair_repeats_left = patterns.pair_repeat(self.slot / 2);
            } else if pair_end < self.active {
                // into the fixed-frequency tail
                self.slot = pair_end;
            } else {
                return self.next_cycle(targets, patterns);
            }
        } else if self.slot + 1 < self.active {
            self.slot += 1;
        } else {
            return self.next_cycle(targets, patterns);
        }
        self.freq_left = targets.frequency(self.slot);
        false
    }

    fn next_cycle(&mut self, targets: &TargetConfig, patterns: &PatternConfig) -> bool {
        self.cycles_left -= 1;
        if self.cycles_left == 0 {
            return true;
        }
        trace!("hammer cycle boundary, {} left", self.cycles_left);
        self.slot = 0;
        self.freq_left = targets.frequency(0);
        self.pair_repeats_left = patterns.pair_repeat(0);
        false
    }

    /// Consumes outstanding responses. Returns `true` once the credit is
    /// back to zero and the phase may be left.
    pub(crate) fn drain(&mut self, port: &mut dyn MemoryPort) -> bool {
        if port.pop_read().is_some() {
            self.credit -= 1;
        }
        self.credit == 0
    }

    pub(crate) fn current_address(&self, targets: &TargetConfig) -> u32 {
        targets.address(self.slot)
    }

    pub(crate) fn sub_state(&self) -> u16 {
        self.slot as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetRow;
    use crate::pattern::Word;
    use crate::port::WriteBeat;

    /// Always-ready port that records accepted read commands and answers
    /// them on the next tick.
    #[derive(Default)]
    struct RecordingPort {
        reads: Vec<u32>,
        pending: usize,
    }

    impl MemoryPort for RecordingPort {
        fn cmd_ready(&self) -> bool {
            true
        }
        fn issue(&mut self, cmd: Command) {
            assert!(!cmd.write);
            self.reads.push(cmd.address);
            self.pending += 1;
        }
        fn wdata_ready(&self) -> bool {
            false
        }
        fn push_write(&mut self, _beat: WriteBeat) {
            unreachable!("hammer never writes");
        }
        fn pop_read(&mut self) -> Option<Word> {
            if self.pending > 0 {
                self.pending -= 1;
                Some(0)
            } else {
                None
            }
        }
        fn tick(&mut self) {}
    }

    fn targets_with(rows: &[(u32, u32)], active: u32) -> TargetConfig {
        let mut targets = TargetConfig::default();
        for (slot, &(address, frequency)) in rows.iter().enumerate() {
            targets
                .set_row(slot as u32, TargetRow { address, frequency })
                .unwrap();
        }
        targets.set_active_count(active).unwrap();
        targets
    }

    fn run(targets: &TargetConfig, patterns: &PatternConfig) -> Vec<u32> {
        let mut port = RecordingPort::default();
        let mut seq = HammerSequencer::new(targets, patterns);
        while !seq.step(&mut port, targets, patterns) {
            assert!(port.reads.len() < 100_000, "hammer walk does not terminate");
        }
        while !seq.drain(&mut port) {}
        port.reads
    }

    /// Collapses the raw access stream into (address, run length) pairs.
    fn runs(reads: &[u32]) -> Vec<(u32, u32)> {
        let mut out: Vec<(u32, u32)> = vec![];
        for &addr in reads {
            match out.last_mut() {
                Some((last, count)) if *last == addr => *count += 1,
                _ => out.push((addr, 1)),
            }
        }
        out
    }

    #[test]
    fn test_pair_repeat_revisits_pair() {
        // two rows, frequencies 3 and 5, pair walked twice
        let targets = targets_with(&[(0x10, 3), (0x20, 5)], 2);
        let mut patterns = PatternConfig::default();
        patterns.set_pair_repeat(0, 2).unwrap();

        let reads = run(&targets, &patterns);
        assert_eq!(
            runs(&reads),
            vec![(0x10, 3), (0x20, 5), (0x10, 3), (0x20, 5)]
        );
    }

    #[test]
    fn test_tail_slots_single_access() {
        // rows 1-10 per their frequencies, row 11 exactly once
        let rows: Vec<(u32, u32)> = (0..11).map(|i| (0x100 + i, i % 3 + 1)).collect();
        let targets = targets_with(&rows, 11);
        let patterns = PatternConfig::default();

        let reads = run(&targets, &patterns);
        let expected: Vec<(u32, u32)> = rows
            .iter()
            .enumerate()
            .map(|(slot, &(addr, freq))| (addr, if slot < FREQ_TARGETS { freq } else { 1 }))
            .collect();
        assert_eq!(runs(&reads), expected);
    }

    #[test]
    fn test_cycle_repeat_repeats_whole_visit() {
        let targets = targets_with(&[(1, 2), (2, 2), (3, 4)], 3);
        let mut patterns = PatternConfig::default();
        patterns.set_cycle_repeat(3).unwrap();

        let reads = run(&targets, &patterns);
        let one_cycle = vec![(1, 2), (2, 2), (3, 4)];
        let expected: Vec<(u32, u32)> = one_cycle
            .iter()
            .cycle()
            .take(one_cycle.len() * 3)
            .copied()
            .collect();
        assert_eq!(runs(&reads), expected);
    }

    #[test]
    fn test_half_pair_repeats_alone() {
        // a single active row forms a half pair and is still revisited
        let targets = targets_with(&[(7, 2)], 1);
        let mut patterns = PatternConfig::default();
        patterns.set_pair_repeat(0, 3).unwrap();

        let reads = run(&targets, &patterns);
        assert_eq!(runs(&reads), vec![(7, 6)]);
        assert_eq!(reads.len(), 6);
    }

    #[test]
    fn test_access_counts_match_frequencies() {
        let targets = targets_with(&[(0xA, 4), (0xB, 1), (0xC, 9), (0xD, 2)], 4);
        let mut patterns = PatternConfig::default();
        patterns.set_pair_repeat(0, 2).unwrap();
        patterns.set_cycle_repeat(2).unwrap();

        let reads = run(&targets, &patterns);
        let count = |addr| reads.iter().filter(|&&a| a == addr).count() as u32;
        // pair (0xA,0xB) walked twice per cycle, pair (0xC,0xD) once, 2 cycles
        assert_eq!(count(0xA), 4 * 2 * 2);
        assert_eq!(count(0xB), 2 * 2);
        assert_eq!(count(0xC), 9 * 2);
        assert_eq!(count(0xD), 2 * 2);
    }

    #[test]
    fn test_credit_drains_to_zero() {
        let targets = targets_with(&[(1, 3), (2, 3)], 2);
        let patterns = PatternConfig::default();
        let mut port = RecordingPort::default();
        let mut seq = HammerSequencer::new(&targets, &patterns);
        while !seq.step(&mut port, &targets, &patterns) {}
        // the final command was accepted but not yet answered
        assert!(seq.credit > 0);
        while !seq.drain(&mut port) {}
        assert_eq!(seq.credit, 0);
    }
}
