//! The phase orchestrator.
//!
//! [`RowHammerTester`] owns the configuration stores, the register surface
//! and the active phase sequencer, and advances everything one tick at a
//! time. A run walks
//!
//! ```text
//! Idle -> Fill -> Verify -> InitSettings -> Hammer -> ResetSettings
//!      -> Verify -> (Report)? -> FinalCheck -> Idle
//! ```
//!
//! with the verify pass shared between the pre-hammer baseline check and the
//! post-hammer flip detection; a pre-hammer verify that finds mismatches also
//! detours through the report phase. Exactly one sequencer is active at a
//! time, and one call to [`step()`](RowHammerTester::step) performs at most
//! one state transition per sequencer. The start level is observed only in
//! the idle and final-check states; a phase once entered always runs to
//! completion.

use itertools::Itertools;
use log::{debug, info};

use crate::config::{
    PatternConfig, PatternSequencer, TargetConfig, TargetSequencer,
};
use crate::port::{MemoryPort, PortGeometry, RefreshControl};
use crate::registers::{Registers, feedback};
use crate::sequencer::{FillSequencer, HammerSequencer, ReportSequencer, VerifySequencer};

/// Default settle delay applied to configuration requests, in ticks.
pub const DEFAULT_SETTLE_TICKS: u32 = 16;

enum Phase {
    Idle,
    Fill(FillSequencer),
    Verify(VerifySequencer),
    Report(ReportSequencer),
    InitSettings,
    Hammer(HammerSequencer),
    ResetSettings(HammerSequencer),
    FinalCheck,
}

/// The row-hammer test core.
///
/// Construct one per memory port, program it through
/// [`registers_mut()`](RowHammerTester::registers_mut) (or the helpers in
/// [`host`](crate::host)), and call [`step()`](RowHammerTester::step) in
/// lock-step with the port's own tick.
pub struct RowHammerTester {
    geometry: PortGeometry,
    regs: Registers,
    targets: TargetConfig,
    patterns: PatternConfig,
    target_seq: TargetSequencer,
    pattern_seq: PatternSequencer,
    phase: Phase,
    error_count: u32,
    ran_hammer: bool,
    baseline_refresh: u32,
    baseline_refresh_enabled: bool,
    baseline_precharge: bool,
}

impl RowHammerTester {
    /// Creates a tester for a port with the given geometry, using the
    /// default configuration settle delay.
    pub fn new(geometry: PortGeometry) -> Self {
        Self::with_settle_ticks(geometry, DEFAULT_SETTLE_TICKS)
    }

    /// Creates a tester with an explicit configuration settle delay.
    pub fn with_settle_ticks(geometry: PortGeometry, settle_ticks: u32) -> Self {
        RowHammerTester {
            geometry,
            regs: Registers::default(),
            targets: TargetConfig::default(),
            patterns: PatternConfig::default(),
            target_seq: TargetSequencer::new(settle_ticks),
            pattern_seq: PatternSequencer::new(settle_ticks),
            phase: Phase::Idle,
            error_count: 0,
            ran_hammer: false,
            baseline_refresh: 0,
            baseline_refresh_enabled: true,
            baseline_precharge: false,
        }
    }

    /// The register surface, for polling status fields.
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// The register surface, for host writes.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// The port geometry this tester was built for.
    pub fn geometry(&self) -> PortGeometry {
        self.geometry
    }

    /// The target-row store, read-only.
    pub fn targets(&self) -> &TargetConfig {
        &self.targets
    }

    /// The pattern store, read-only.
    pub fn patterns(&self) -> &PatternConfig {
        &self.patterns
    }

    /// Whether the core sits in the idle state.
    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// Advances the core one tick: both configuration sequencers, then at
    /// most one transition of the active phase.
    pub fn step(&mut self, port: &mut dyn MemoryPort, refresh: &mut dyn RefreshControl) {
        self.target_seq.step(&mut self.regs, &mut self.targets);
        self.pattern_seq.step(&mut self.regs, &mut self.patterns);
        self.step_phase(port, refresh);
        self.update_feedback();
    }

    fn step_phase(&mut self, port: &mut dyn MemoryPort, refresh: &mut dyn RefreshControl) {
        let double_pattern = self.regs.double_pattern;
        self.phase = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {
                if self.regs.hammer_start {
                    self.regs.hammer_started = true;
                    info!("test run starting");
                    self.regs.scan_address = 0;
                    Phase::Fill(FillSequencer::new(&self.geometry))
                } else {
                    self.regs.hammer_started = false;
                    Phase::Idle
                }
            }
            Phase::Fill(mut seq) => {
                if seq.step(port, &self.patterns, double_pattern) {
                    self.error_count = 0;
                    self.regs.error_count = 0;
                    self.regs.scan_address = 0;
                    self.ran_hammer = false;
                    self.regs.before_after = false;
                    debug!("fill done, running baseline verify");
                    Phase::Verify(VerifySequencer::new(&self.geometry))
                } else {
                    self.regs.scan_address = seq.address();
                    Phase::Fill(seq)
                }
            }
            Phase::Verify(mut seq) => {
                if seq.step(port, &self.patterns, double_pattern, &mut self.error_count) {
                    self.regs.error_count = self.error_count;
                    if self.error_count > 0 {
                        info!(
                            "verify found {} mismatch(es), replaying error addresses",
                            self.error_count
                        );
                        self.regs.scan_address = 0;
                        Phase::Report(ReportSequencer::new(&self.geometry))
                    } else {
                        self.finish_verify()
                    }
                } else {
                    self.regs.scan_address = seq.address();
                    self.regs.error_count = self.error_count;
                    Phase::Verify(seq)
                }
            }
            Phase::Report(mut seq) => {
                if seq.step(port, &self.patterns, double_pattern, &mut self.regs) {
                    self.finish_verify()
                } else {
                    Phase::Report(seq)
                }
            }
            Phase::InitSettings => {
                self.apply_hammer_settings(refresh);
                Phase::Hammer(HammerSequencer::new(&self.targets, &self.patterns))
            }
            Phase::Hammer(mut seq) => {
                self.regs.scan_address = seq.current_address(&self.targets);
                if seq.step(port, &self.targets, &self.patterns) {
                    Phase::ResetSettings(seq)
                } else {
                    Phase::Hammer(seq)
                }
            }
            Phase::ResetSettings(mut seq) => {
                if seq.drain(port) {
                    self.restore_hammer_settings(refresh);
                    self.error_count = 0;
                    self.regs.error_count = 0;
                    self.regs.scan_address = 0;
                    self.ran_hammer = true;
                    self.regs.before_after = true;
                    debug!("hammer settings restored, running flip detection verify");
                    Phase::Verify(VerifySequencer::new(&self.geometry))
                } else {
                    Phase::ResetSettings(seq)
                }
            }
            Phase::FinalCheck => {
                if self.regs.hammer_start {
                    Phase::FinalCheck
                } else {
                    info!("test run finished with {} error(s)", self.error_count);
                    self.regs.hammer_started = false;
                    Phase::Idle
                }
            }
        };
    }

    /// Routing after a verify (or its report detour) completes: back to the
    /// hammer phase if it has not run yet, otherwise to the final check.
    fn finish_verify(&mut self) -> Phase {
        self.regs.scan_address = 0;
        if self.ran_hammer {
            Phase::FinalCheck
        } else {
            Phase::InitSettings
        }
    }

    fn apply_hammer_settings(&mut self, refresh: &mut dyn RefreshControl) {
        self.baseline_refresh = refresh.refresh_interval();
        self.baseline_refresh_enabled = refresh.refresh_enabled();
        self.baseline_precharge = refresh.auto_precharge();
        if self.regs.refresh_enable {
            if self.regs.refresh_interval != 0 {
                refresh.set_refresh_interval(self.regs.refresh_interval);
            }
        } else {
            refresh.set_refresh_enabled(false);
        }
        refresh.set_auto_precharge(self.regs.auto_precharge);
        let active = self.targets.active_count() as usize;
        info!(
            "hammering {} row(s), {} cycle(s): {}",
            active,
            self.patterns.cycle_repeat(),
            (0..active)
                .map(|slot| format!(
                    "{:#x}x{}",
                    self.targets.address(slot),
                    self.targets.frequency(slot)
                ))
                .join(", ")
        );
    }

    fn restore_hammer_settings(&mut self, refresh: &mut dyn RefreshControl) {
        refresh.set_refresh_interval(self.baseline_refresh);
        refresh.set_refresh_enabled(self.baseline_refresh_enabled);
        refresh.set_auto_precharge(self.baseline_precharge);
    }

    fn update_feedback(&mut self) {
        self.regs.feedback = match &self.phase {
            Phase::Idle => feedback::IDLE,
            Phase::Fill(seq) => feedback::FILL | seq.sub_state(),
            Phase::Verify(seq) => feedback::VERIFY | seq.sub_state(),
            Phase::Report(seq) => feedback::REPORT | seq.sub_state(),
            Phase::InitSettings => feedback::INIT_SETTINGS,
            Phase::Hammer(seq) => feedback::HAMMER | seq.sub_state(),
            Phase::ResetSettings(_) => feedback::RESET_SETTINGS,
            Phase::FinalCheck => feedback::FINAL_CHECK,
        };
    }
}
