//! Host-visible register surface.
//!
//! [`Registers`] is the only way a host interacts with the core. Storage
//! fields are written by the host and read by the core; status fields are
//! written by the core and polled by the host. The bus transport that exposes
//! these fields (CSR bus, wishbone, whatever) is an external collaborator;
//! this struct is the contract.

use crate::config::ConfigError;
use crate::pattern::WORD_CHUNKS;

/// Phase feedback codes.
///
/// The high byte of the 16-bit feedback status selects the phase; the low
/// bits carry a phase-specific sub-state.
pub mod feedback {
    /// Waiting for a start request.
    pub const IDLE: u16 = 0x0100;
    /// Streaming the fill pattern across the address range.
    pub const FILL: u16 = 0x0200;
    /// Scanning the address range and comparing against the pattern.
    pub const VERIFY: u16 = 0x0400;
    /// Replaying mismatched addresses to the host.
    pub const REPORT: u16 = 0x0800;
    /// Applying refresh/precharge settings before hammering.
    pub const INIT_SETTINGS: u16 = 0x1000;
    /// Hammering the configured target rows.
    pub const HAMMER: u16 = 0x2000;
    /// Draining outstanding accesses and restoring settings.
    pub const RESET_SETTINGS: u16 = 0x4000;
    /// Run complete; waiting for the start level to drop.
    pub const FINAL_CHECK: u16 = 0x8000;

    /// Mask selecting the phase part of a feedback code.
    pub const PHASE_MASK: u16 = 0xFF00;
}

/// The register file shared between host and core.
///
/// All `*_start` and `error_ack` fields are level signals: the host raises
/// them, waits for the matching acknowledge status, then lowers them again.
#[derive(Debug)]
pub struct Registers {
    // Target configuration store (host -> core)
    /// Row address for the next target SET request.
    pub target_value: u32,
    /// Access frequency for the next target SET request. Also carries the
    /// active-row count when `target_select` addresses the count slot.
    pub target_frequency: u32,
    /// Slot the next target request addresses (`0..=19` rows, `20` count).
    pub target_select: u32,
    /// `true`: SET the addressed slot; `false`: GET it into the output
    /// mirrors.
    pub target_set_not_get: bool,
    /// Start level for the target configuration sequencer.
    pub target_start: bool,

    // Target configuration store (core -> host)
    /// High once a target request has been honored, until start drops.
    pub target_ack: bool,
    /// Row address mirror filled by a target GET.
    pub target_value_out: u32,
    /// Frequency (or active-count) mirror filled by a target GET.
    pub target_frequency_out: u32,

    // Pattern configuration store (host -> core)
    /// Slot the next pattern request addresses (`0..=1` patterns,
    /// `2..=6` pair repeats, `7` cycle repeat).
    pub pattern_select: u32,
    /// `true`: SET the addressed slot; `false`: GET it.
    pub pattern_set_not_get: bool,
    /// 32-bit pattern value for a pattern SET (replicated to word width).
    pub pattern_value: u32,
    /// Repeat count for a pair/cycle counter SET.
    pub counter_value: u32,
    /// Start level for the pattern configuration sequencer.
    pub pattern_start: bool,
    /// Enables alternation between the two patterns at row granularity.
    pub double_pattern: bool,

    // Pattern configuration store (core -> host)
    /// High once a pattern request has been honored, until start drops.
    pub pattern_ack: bool,
    /// Low 32 bits of the addressed pattern, filled by a pattern GET.
    pub pattern_out: u32,
    /// Repeat-counter mirror filled by a counter GET.
    pub counter_out: u32,

    /// Outcome of the most recent configuration request. `None` when the
    /// request was honored; rejected requests leave the store unchanged.
    pub config_error: Option<ConfigError>,

    // Refresh and precharge settings (host -> core)
    /// Keep refresh running during the hammer phase. When `false`, refresh
    /// is disabled entirely for the duration of the phase.
    pub refresh_enable: bool,
    /// Refresh interval applied during the hammer phase. `0` leaves the
    /// controller's interval untouched.
    pub refresh_interval: u32,
    /// Auto-precharge setting applied during the hammer phase.
    pub auto_precharge: bool,

    // Run control
    /// Start level for a full test run. Sampled in idle and final-check
    /// states only; a running phase always completes.
    pub hammer_start: bool,
    /// Mirrors the sampled start level back to the host.
    pub hammer_started: bool,

    // Run status (core -> host)
    /// Current scan or attack address.
    pub scan_address: u32,
    /// Mismatches accumulated by the most recent verify pass.
    pub error_count: u32,
    /// Phase/sub-phase feedback code, see [`feedback`].
    pub feedback: u16,
    /// `false` while the verify pass precedes the hammer phase, `true` after.
    pub before_after: bool,

    // Error reporting
    /// Acknowledge level for the currently displayed error.
    pub error_ack: bool,
    /// Mirrors the sampled acknowledge level back to the host.
    pub error_ack_seen: bool,
    /// High while a mismatching datum is held for the host.
    pub error_found: bool,
    /// The offending datum, split into 32-bit chunks, lowest first.
    pub error_data: [u32; WORD_CHUNKS],
}

impl Default for Registers {
    fn default() -> Self {
        Registers {
            target_value: 0,
            target_frequency: 0,
            target_select: 0,
            target_set_not_get: false,
            target_start: false,
            target_ack: false,
            target_value_out: 0,
            target_frequency_out: 0,
            pattern_select: 0,
            pattern_set_not_get: false,
            pattern_value: 0,
            counter_value: 0,
            pattern_start: false,
            double_pattern: false,
            pattern_ack: false,
            pattern_out: 0,
            counter_out: 0,
            config_error: None,
            refresh_enable: true,
            refresh_interval: 0,
            auto_precharge: false,
            hammer_start: false,
            hammer_started: false,
            scan_address: 0,
            error_count: 0,
            feedback: feedback::IDLE,
            before_after: false,
            error_ack: false,
            error_ack_seen: false,
            error_found: false,
            error_data: [0; WORD_CHUNKS],
        }
    }
}

impl Registers {
    /// The phase part of the current feedback code.
    pub fn phase(&self) -> u16 {
        self.feedback & feedback::PHASE_MASK
    }
}
