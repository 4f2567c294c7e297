//! Host-side driver.
//!
//! [`HostDriver`] wraps a [`RowHammerTester`] together with its port and
//! refresh control, and speaks the level/acknowledge protocol of the register
//! surface so callers don't have to: configuration requests pulse the start
//! level and wait for the acknowledge to rise and fall again, and
//! [`run()`](HostDriver::run) drives a whole test run while collecting every
//! reported error into a serializable [`RunSummary`].
//!
//! Every wait is bounded by a tick budget; a core that stops making progress
//! surfaces as [`HostError::Timeout`] instead of a hang.

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, TargetRow};
use crate::port::{MemoryPort, RefreshControl};
use crate::registers::feedback;
use crate::tester::RowHammerTester;

/// Default upper bound on ticks spent in a single driver call.
pub const DEFAULT_TICK_BUDGET: u64 = 1 << 32;

/// Errors surfaced by the host driver.
#[derive(Debug, Error)]
pub enum HostError {
    /// The core refused a configuration request.
    #[error("configuration request rejected: {0}")]
    Rejected(#[from] ConfigError),
    /// The core did not reach the awaited state within the tick budget.
    #[error("core made no progress within {0} ticks")]
    Timeout(u64),
}

/// One error held by the report phase and acknowledged by the driver.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ErrorReport {
    /// Word address of the offending datum.
    pub address: u32,
    /// Row part of the address.
    pub row: u32,
    /// Bank part of the address.
    pub bank: u32,
    /// Column part of the address.
    pub col: u32,
    /// The datum as read back, in 32-bit chunks, lowest first.
    pub data: [u32; crate::pattern::WORD_CHUNKS],
    /// Whether this error surfaced before the hammer phase ran.
    pub before_hammer: bool,
}

/// Everything a completed test run produced.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// ISO 8601 timestamp of when the run started.
    pub date: String,
    /// Ticks the run took, start pulse to idle.
    pub ticks: u64,
    /// Mismatches the baseline verify found before hammering.
    pub baseline_errors: u32,
    /// Mismatches the verify found after hammering.
    pub flip_errors: u32,
    /// Every error the report phases held for the host.
    pub errors: Vec<ErrorReport>,
}

/// Drives a tester, its memory port and its refresh control in lock-step.
pub struct HostDriver<'a> {
    tester: &'a mut RowHammerTester,
    port: &'a mut dyn MemoryPort,
    refresh: &'a mut dyn RefreshControl,
    tick_budget: u64,
    ticks: u64,
}

impl<'a> HostDriver<'a> {
    /// Creates a driver with the default tick budget.
    pub fn new(
        tester: &'a mut RowHammerTester,
        port: &'a mut dyn MemoryPort,
        refresh: &'a mut dyn RefreshControl,
    ) -> Self {
        Self::with_tick_budget(tester, port, refresh, DEFAULT_TICK_BUDGET)
    }

    /// Creates a driver with an explicit tick budget per call.
    pub fn with_tick_budget(
        tester: &'a mut RowHammerTester,
        port: &'a mut dyn MemoryPort,
        refresh: &'a mut dyn RefreshControl,
        tick_budget: u64,
    ) -> Self {
        HostDriver {
            tester,
            port,
            refresh,
            tick_budget,
            ticks: 0,
        }
    }

    /// The tester under the driver, for direct register access.
    pub fn tester(&mut self) -> &mut RowHammerTester {
        self.tester
    }

    /// Total ticks this driver has spent so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn tick(&mut self, spent: &mut u64) -> Result<(), HostError> {
        if *spent >= self.tick_budget {
            return Err(HostError::Timeout(self.tick_budget));
        }
        self.tester.step(self.port, self.refresh);
        self.port.tick();
        self.ticks += 1;
        *spent += 1;
        Ok(())
    }

    /// Programs one target row slot.
    pub fn set_target_row(&mut self, slot: u32, row: TargetRow) -> Result<(), HostError> {
        let regs = self.tester.registers_mut();
        regs.target_select = slot;
        regs.target_value = row.address;
        regs.target_frequency = row.frequency;
        regs.target_set_not_get = true;
        self.pulse_target()
    }

    /// Reads a target row slot back.
    pub fn target_row(&mut self, slot: u32) -> Result<TargetRow, HostError> {
        let regs = self.tester.registers_mut();
        regs.target_select = slot;
        regs.target_set_not_get = false;
        self.pulse_target()?;
        let regs = self.tester.registers();
        Ok(TargetRow {
            address: regs.target_value_out,
            frequency: regs.target_frequency_out,
        })
    }

    /// Sets how many leading target slots a run visits.
    pub fn set_active_count(&mut self, count: u32) -> Result<(), HostError> {
        let regs = self.tester.registers_mut();
        regs.target_select = crate::config::ACTIVE_COUNT_SELECT;
        regs.target_frequency = count;
        regs.target_set_not_get = true;
        self.pulse_target()
    }

    /// Programs one of the two data patterns from a 32-bit value.
    pub fn set_pattern(&mut self, which: u32, value: u32) -> Result<(), HostError> {
        let regs = self.tester.registers_mut();
        regs.pattern_select = which;
        regs.pattern_value = value;
        regs.pattern_set_not_get = true;
        self.pulse_pattern()
    }

    /// Sets the revisit count of a target slot pair.
    pub fn set_pair_repeat(&mut self, pair: u32, count: u32) -> Result<(), HostError> {
        let regs = self.tester.registers_mut();
        regs.pattern_select = pair + 2;
        regs.counter_value = count;
        regs.pattern_set_not_get = true;
        self.pulse_pattern()
    }

    /// Sets how many times the whole ordered row visit repeats.
    pub fn set_cycle_repeat(&mut self, count: u32) -> Result<(), HostError> {
        let regs = self.tester.registers_mut();
        regs.pattern_select = 7;
        regs.counter_value = count;
        regs.pattern_set_not_get = true;
        self.pulse_pattern()
    }

    /// Enables or disables row-granular alternation between the patterns.
    pub fn set_double_pattern(&mut self, enabled: bool) {
        self.tester.registers_mut().double_pattern = enabled;
    }

    /// Configures the refresh and precharge behavior of the hammer phase.
    pub fn set_refresh(&mut self, enable: bool, interval: u32, auto_precharge: bool) {
        let regs = self.tester.registers_mut();
        regs.refresh_enable = enable;
        regs.refresh_interval = interval;
        regs.auto_precharge = auto_precharge;
    }

    fn pulse_target(&mut self) -> Result<(), HostError> {
        let mut spent = 0;
        self.tester.registers_mut().target_start = true;
        while !self.tester.registers().target_ack {
            self.tick(&mut spent)?;
        }
        let rejection = self.tester.registers().config_error;
        self.tester.registers_mut().target_start = false;
        while self.tester.registers().target_ack {
            self.tick(&mut spent)?;
        }
        rejection.map_or(Ok(()), |err| Err(err.into()))
    }

    fn pulse_pattern(&mut self) -> Result<(), HostError> {
        let mut spent = 0;
        self.tester.registers_mut().pattern_start = true;
        while !self.tester.registers().pattern_ack {
            self.tick(&mut spent)?;
        }
        let rejection = self.tester.registers().config_error;
        self.tester.registers_mut().pattern_start = false;
        while self.tester.registers().pattern_ack {
            self.tick(&mut spent)?;
        }
        rejection.map_or(Ok(()), |err| Err(err.into()))
    }

    /// Runs one full test: start pulse, error collection, return to idle.
    pub fn run(&mut self) -> Result<RunSummary, HostError> {
        let date = chrono::Local::now().to_rfc3339();
        let geometry = self.tester.geometry();
        let run_start = self.ticks;
        let mut spent = 0;
        let mut errors = Vec::new();
        let mut baseline_errors = 0;

        self.tester.registers_mut().hammer_start = true;
        loop {
            self.tick(&mut spent)?;
            let regs = self.tester.registers();
            if regs.error_found {
                let address = regs.scan_address;
                let report = ErrorReport {
                    address,
                    row: geometry.row_of(address),
                    bank: geometry.bank_of(address),
                    col: geometry.col_of(address),
                    data: regs.error_data,
                    before_hammer: !regs.before_after,
                };
                info!(
                    "error at {:#x} (row {}, bank {}, col {}): {:08x?}",
                    report.address, report.row, report.bank, report.col, report.data
                );
                errors.push(report);
                self.tester.registers_mut().error_ack = true;
                self.tick(&mut spent)?;
                self.tester.registers_mut().error_ack = false;
                self.tick(&mut spent)?;
                continue;
            }
            if !regs.before_after {
                baseline_errors = baseline_errors.max(regs.error_count);
            }
            if regs.phase() == feedback::FINAL_CHECK {
                break;
            }
        }

        let flip_errors = self.tester.registers().error_count;
        self.tester.registers_mut().hammer_start = false;
        while !self.tester.is_idle() {
            self.tick(&mut spent)?;
        }
        debug!(
            "run complete after {} ticks, {} baseline / {} flip error(s)",
            self.ticks - run_start,
            baseline_errors,
            flip_errors
        );
        Ok(RunSummary {
            date,
            ticks: self.ticks - run_start,
            baseline_errors,
            flip_errors,
            errors,
        })
    }
}
