//! Target and pattern configuration stores.
//!
//! Two small stores hold everything a test run is parameterized by: the
//! target rows with their access frequencies, and the data patterns with the
//! pair/cycle repeat counters. Each store is written and read through a
//! one-shot request sequencer driven from the register surface: the host
//! raises a start level, the request settles for a fixed number of ticks,
//! exactly one SET-or-GET action runs, and the acknowledge status goes high
//! until the host releases the start level.
//!
//! Requests with an out-of-range slot, a zero frequency or repeat count, or
//! an active count outside `1..=20` are rejected and leave the store
//! unchanged; the rejection is latched into
//! [`Registers::config_error`](crate::registers::Registers::config_error).

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

use crate::pattern::{Word, replicate};
use crate::registers::Registers;
use crate::util::RequestGate;

/// Number of target row slots.
pub const MAX_TARGETS: usize = 20;

/// Number of leading slots that carry a programmable access frequency.
/// The remaining slots have an implicit frequency of 1.
pub const FREQ_TARGETS: usize = 10;

/// Number of slot pairs with a programmable revisit count.
pub const PAIR_COUNT: usize = FREQ_TARGETS / 2;

/// Target store slot index that addresses the active-row count.
pub const ACTIVE_COUNT_SELECT: u32 = MAX_TARGETS as u32;

/// Pattern store slot indices: `0..=1` the two data patterns, `2..=6` the
/// pair repeat counters, `7` the cycle repeat counter.
pub const PATTERN_SELECT_MAX: u32 = 7;

/// A configuration request the core refused to honor.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfigError {
    /// The target slot index does not address a row or the count slot.
    #[error("target slot {0} out of range 0..={ACTIVE_COUNT_SELECT}")]
    TargetSlotOutOfRange(u32),
    /// The pattern slot index does not address a pattern or a counter.
    #[error("pattern slot {0} out of range 0..={PATTERN_SELECT_MAX}")]
    PatternSlotOutOfRange(u32),
    /// The active-row count must cover at least one and at most all slots.
    #[error("active count {0} outside 1..={MAX_TARGETS}")]
    ActiveCountOutOfRange(u32),
    /// Access frequencies must be at least 1.
    #[error("access frequency must be at least 1")]
    ZeroFrequency,
    /// Pair and cycle repeat counts must be at least 1.
    #[error("repeat count must be at least 1")]
    ZeroRepeat,
}

/// One configured target row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetRow {
    /// Word address of the row to attack.
    pub address: u32,
    /// Read accesses issued per visit.
    pub frequency: u32,
}

impl Default for TargetRow {
    fn default() -> Self {
        TargetRow {
            address: 0,
            frequency: 1,
        }
    }
}

/// The target-row configuration store.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    slots: [TargetRow; MAX_TARGETS],
    active_count: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            slots: [TargetRow::default(); MAX_TARGETS],
            active_count: 1,
        }
    }
}

impl TargetConfig {
    /// Writes a target slot.
    ///
    /// Slots past [`FREQ_TARGETS`] ignore the requested frequency; theirs is
    /// fixed at 1.
    pub fn set_row(&mut self, slot: u32, row: TargetRow) -> Result<(), ConfigError> {
        if slot as usize >= MAX_TARGETS {
            return Err(ConfigError::TargetSlotOutOfRange(slot));
        }
        if row.frequency == 0 {
            return Err(ConfigError::ZeroFrequency);
        }
        let slot = slot as usize;
        self.slots[slot] = if slot < FREQ_TARGETS {
            row
        } else {
            TargetRow {
                address: row.address,
                frequency: 1,
            }
        };
        Ok(())
    }

    /// Reads a target slot.
    pub fn row(&self, slot: u32) -> Result<TargetRow, ConfigError> {
        self.slots
            .get(slot as usize)
            .copied()
            .ok_or(ConfigError::TargetSlotOutOfRange(slot))
    }

    /// Sets how many leading slots a run visits.
    pub fn set_active_count(&mut self, count: u32) -> Result<(), ConfigError> {
        if count == 0 || count as usize > MAX_TARGETS {
            return Err(ConfigError::ActiveCountOutOfRange(count));
        }
        self.active_count = count;
        Ok(())
    }

    /// Number of leading slots a run visits.
    pub fn active_count(&self) -> u32 {
        self.active_count
    }

    /// Word address of a slot. Callers guarantee `slot < MAX_TARGETS`.
    pub(crate) fn address(&self, slot: usize) -> u32 {
        self.slots[slot].address
    }

    /// Access frequency of a slot, with the implicit 1 for the tail slots.
    pub(crate) fn frequency(&self, slot: usize) -> u32 {
        if slot < FREQ_TARGETS {
            self.slots[slot].frequency
        } else {
            1
        }
    }
}

/// The data-pattern and repeat-counter configuration store.
#[derive(Debug, Clone)]
pub struct PatternConfig {
    data: [Word; 2],
    pair_repeat: [u32; PAIR_COUNT],
    cycle_repeat: u32,
}

impl Default for PatternConfig {
    fn default() -> Self {
        PatternConfig {
            data: [0; 2],
            pair_repeat: [1; PAIR_COUNT],
            cycle_repeat: 1,
        }
    }
}

impl PatternConfig {
    /// Stores a 32-bit pattern value, replicated to word width.
    pub fn set_pattern(&mut self, which: usize, value: u32) {
        self.data[which] = replicate(value);
    }

    /// The full-width word of a stored pattern.
    pub fn pattern(&self, which: usize) -> Word {
        self.data[which]
    }

    /// Sets the revisit count of a slot pair.
    pub fn set_pair_repeat(&mut self, pair: usize, count: u32) -> Result<(), ConfigError> {
        if count == 0 {
            return Err(ConfigError::ZeroRepeat);
        }
        self.pair_repeat[pair] = count;
        Ok(())
    }

    /// Revisit count of a slot pair.
    pub fn pair_repeat(&self, pair: usize) -> u32 {
        self.pair_repeat[pair]
    }

    /// Sets how many times the whole ordered row visit repeats.
    pub fn set_cycle_repeat(&mut self, count: u32) -> Result<(), ConfigError> {
        if count == 0 {
            return Err(ConfigError::ZeroRepeat);
        }
        self.cycle_repeat = count;
        Ok(())
    }

    /// How many times the whole ordered row visit repeats.
    pub fn cycle_repeat(&self) -> u32 {
        self.cycle_repeat
    }

    /// The word expected at scan position `index`.
    ///
    /// With double-pattern mode on, the active pattern flips every
    /// `row_span` positions; otherwise the first pattern covers everything.
    pub fn expected(&self, index: u32, row_span: u32, double_pattern: bool) -> Word {
        if double_pattern && (index / row_span) % 2 == 1 {
            self.data[1]
        } else {
            self.data[0]
        }
    }
}

/// Request sequencer for the target store.
pub(crate) struct TargetSequencer {
    gate: RequestGate,
}

impl TargetSequencer {
    pub(crate) fn new(settle_ticks: u32) -> Self {
        TargetSequencer {
            gate: RequestGate::new(settle_ticks),
        }
    }

    pub(crate) fn step(&mut self, regs: &mut Registers, targets: &mut TargetConfig) {
        let fire = self.gate.poll(regs.target_start);
        regs.target_ack = self.gate.acked();
        if !fire {
            return;
        }
        let result = if regs.target_set_not_get {
            self.set(regs, targets)
        } else {
            self.get(regs, targets)
        };
        if let Err(err) = result {
            warn!("target configuration request rejected: {}", err);
        }
        regs.config_error = result.err();
    }

    fn set(&self, regs: &Registers, targets: &mut TargetConfig) -> Result<(), ConfigError> {
        if regs.target_select == ACTIVE_COUNT_SELECT {
            // the count travels in the frequency field, like the row
            // frequencies it bounds
            debug!("set active count to {}", regs.target_frequency);
            return targets.set_active_count(regs.target_frequency);
        }
        debug!(
            "set target slot {}: address {:#x}, frequency {}",
            regs.target_select, regs.target_value, regs.target_frequency
        );
        targets.set_row(
            regs.target_select,
            TargetRow {
                address: regs.target_value,
                frequency: regs.target_frequency,
            },
        )
    }

    fn get(&self, regs: &mut Registers, targets: &TargetConfig) -> Result<(), ConfigError> {
        if regs.target_select == ACTIVE_COUNT_SELECT {
            regs.target_frequency_out = targets.active_count();
            return Ok(());
        }
        let row = targets.row(regs.target_select)?;
        regs.target_value_out = row.address;
        regs.target_frequency_out = row.frequency;
        Ok(())
    }
}

/// Request sequencer for the pattern store.
pub(crate) struct PatternSequencer {
    gate: RequestGate,
}

impl PatternSequencer {
    pub(crate) fn new(settle_ticks: u32) -> Self {
        PatternSequencer {
            gate: RequestGate::new(settle_ticks),
        }
    }

    pub(crate) fn step(&mut self, regs: &mut Registers, patterns: &mut PatternConfig) {
        let fire = self.gate.poll(regs.pattern_start);
        regs.pattern_ack = self.gate.acked();
        if !fire {
            return;
        }
        let result = if regs.pattern_set_not_get {
            self.set(regs, patterns)
        } else {
            self.get(regs, patterns)
        };
        if let Err(err) = result {
            warn!("pattern configuration request rejected: {}", err);
        }
        regs.config_error = result.err();
    }

    fn set(&self, regs: &Registers, patterns: &mut PatternConfig) -> Result<(), ConfigError> {
        match regs.pattern_select {
            which @ 0..=1 => {
                debug!("set data pattern {} to {:#010x}", which, regs.pattern_value);
                patterns.set_pattern(which as usize, regs.pattern_value);
                Ok(())
            }
            pair @ 2..=6 => {
                debug!(
                    "set pair repeat {} to {}",
                    pair - 2,
                    regs.counter_value
                );
                patterns.set_pair_repeat((pair - 2) as usize, regs.counter_value)
            }
            7 => {
                debug!("set cycle repeat to {}", regs.counter_value);
                patterns.set_cycle_repeat(regs.counter_value)
            }
            other => Err(ConfigError::PatternSlotOutOfRange(other)),
        }
    }

    fn get(&self, regs: &mut Registers, patterns: &PatternConfig) -> Result<(), ConfigError> {
        match regs.pattern_select {
            which @ 0..=1 => {
                regs.pattern_out = patterns.pattern(which as usize) as u32;
                Ok(())
            }
            pair @ 2..=6 => {
                regs.counter_out = patterns.pair_repeat((pair - 2) as usize);
                Ok(())
            }
            7 => {
                regs.counter_out = patterns.cycle_repeat();
                Ok(())
            }
            other => Err(ConfigError::PatternSlotOutOfRange(other)),
        }
    }
}
