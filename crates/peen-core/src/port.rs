//! Memory port and refresh control traits.
//!
//! The sequencer core never owns memory. Every access goes through a
//! [`MemoryPort`], which models the native DRAM port of the memory
//! controller: a command channel, a write-data channel and a read-data
//! channel, each with its own ready/valid handshake. The command and data
//! streams advance independently; the core may be issuing commands while
//! still draining previously accepted writes or reads.
//!
//! Refresh timing and auto-precharge are owned by the controller, not by the
//! core. The core only overwrites them on hammer-phase entry and restores
//! them on exit, through [`RefreshControl`].

use serde::Serialize;

use crate::pattern::Word;

/// A single command on the port's command channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Command {
    /// Word address the command targets.
    pub address: u32,
    /// Write enable: `true` issues a write, `false` a read.
    pub write: bool,
}

/// One beat on the write-data channel.
///
/// A write only commits once its command *and* its data beat have both been
/// accepted; the two arrive on separate handshakes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteBeat {
    /// The data word to store.
    pub data: Word,
    /// Byte-enable mask, one bit per byte of [`Word`].
    pub byte_enable: u8,
}

impl WriteBeat {
    /// A full-width beat with all byte lanes enabled.
    pub fn full(data: Word) -> Self {
        WriteBeat {
            data,
            byte_enable: u8::MAX,
        }
    }
}

/// Address geometry of the memory behind the port.
///
/// Addresses are word addresses packed as `row | bank | column`, the layout
/// the controller's native port exposes. One row spans
/// `2^(bank_bits + col_bits)` consecutive word addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PortGeometry {
    /// Total width of a port address in bits. Must be in `1..=31`.
    pub address_bits: u32,
    /// Number of bank bits within an address.
    pub bank_bits: u32,
    /// Number of column bits within an address.
    pub col_bits: u32,
}

impl PortGeometry {
    /// Creates a geometry, checking the field widths are consistent.
    ///
    /// # Panics
    ///
    /// Panics if `address_bits` is outside `1..=31` or smaller than
    /// `bank_bits + col_bits`.
    pub fn new(address_bits: u32, bank_bits: u32, col_bits: u32) -> Self {
        assert!(
            (1..=31).contains(&address_bits),
            "address_bits must be in 1..=31, got {}",
            address_bits
        );
        assert!(
            bank_bits + col_bits <= address_bits,
            "bank_bits + col_bits ({}) exceed address_bits ({})",
            bank_bits + col_bits,
            address_bits
        );
        PortGeometry {
            address_bits,
            bank_bits,
            col_bits,
        }
    }

    /// Highest valid word address.
    pub fn max_address(&self) -> u32 {
        (1u32 << self.address_bits) - 1
    }

    /// Total number of addressable words.
    pub fn word_count(&self) -> u32 {
        1u32 << self.address_bits
    }

    /// Number of word addresses covered by one row (`columns x banks`).
    pub fn row_span(&self) -> u32 {
        1u32 << (self.bank_bits + self.col_bits)
    }

    /// Extracts the row index from a word address.
    pub fn row_of(&self, address: u32) -> u32 {
        address >> (self.bank_bits + self.col_bits)
    }

    /// Extracts the bank index from a word address.
    pub fn bank_of(&self, address: u32) -> u32 {
        (address >> self.col_bits) & ((1 << self.bank_bits) - 1)
    }

    /// Extracts the column index from a word address.
    pub fn col_of(&self, address: u32) -> u32 {
        address & ((1 << self.col_bits) - 1)
    }
}

/// Step-driven memory access port.
///
/// One call to [`tick()`](MemoryPort::tick) advances the port by one step.
/// Readiness queries report backpressure for the current step: the core must
/// only call [`issue()`](MemoryPort::issue) when
/// [`cmd_ready()`](MemoryPort::cmd_ready) is `true`, and
/// [`push_write()`](MemoryPort::push_write) when
/// [`wdata_ready()`](MemoryPort::wdata_ready) is `true`.
///
/// [`pop_read()`](MemoryPort::pop_read) is the read-data handshake: calling
/// it asserts readiness, and it returns a word exactly when the channel has
/// one valid. Read responses arrive in command order.
pub trait MemoryPort {
    /// Whether the command channel accepts a command this step.
    fn cmd_ready(&self) -> bool;

    /// Issues a command. Only valid while [`cmd_ready()`](Self::cmd_ready).
    fn issue(&mut self, cmd: Command);

    /// Whether the write-data channel accepts a beat this step.
    fn wdata_ready(&self) -> bool;

    /// Pushes one write-data beat. Only valid while
    /// [`wdata_ready()`](Self::wdata_ready).
    fn push_write(&mut self, beat: WriteBeat);

    /// Pops the next read response if one is valid this step.
    fn pop_read(&mut self) -> Option<Word>;

    /// Advances the port one step.
    fn tick(&mut self);
}

/// Externally owned refresh and precharge state.
///
/// The values live in the memory controller; the core writes them on hammer
/// entry (test interval, or refresh off) and puts them back on hammer exit.
pub trait RefreshControl {
    /// Current refresh interval in controller ticks.
    fn refresh_interval(&self) -> u32;

    /// Overwrites the refresh interval.
    fn set_refresh_interval(&mut self, interval: u32);

    /// Whether periodic refresh is enabled.
    fn refresh_enabled(&self) -> bool;

    /// Enables or disables periodic refresh.
    fn set_refresh_enabled(&mut self, enabled: bool);

    /// Whether reads close the row with auto-precharge.
    fn auto_precharge(&self) -> bool;

    /// Enables or disables auto-precharge.
    fn set_auto_precharge(&mut self, enabled: bool);
}
