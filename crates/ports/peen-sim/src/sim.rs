//! The simulated port and refresh control.

use std::collections::VecDeque;

use log::{debug, trace};
use peen_core::pattern::Word;
use peen_core::{Command, MemoryPort, PortGeometry, RefreshControl, WriteBeat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Refresh interval the simulated controller boots with, in controller
/// ticks. Matches the usual tREFI/tCK ratio of a DDR3/DDR4 part.
pub const DEFAULT_REFRESH_INTERVAL: u32 = 782;

/// Commands (and write beats) the port buffers before pushing back.
const QUEUE_DEPTH: usize = 8;

/// Backpressure behavior of the simulated channels.
#[derive(Debug, Clone, Copy)]
pub enum Backpressure {
    /// Channels are ready whenever their queues have room.
    None,
    /// Each channel independently refuses a tick with the given probability,
    /// in percent. Models a controller busy with refresh or other requesters.
    Random {
        /// Chance per tick that a channel reports not-ready, `0..=100`.
        deny_percent: u8,
    },
}

struct InFlight {
    cmd: Command,
    age: u32,
}

/// A cell that flips once its aggressor row has been activated often enough.
struct WeakCell {
    victim: u32,
    mask: Word,
    aggressor_row: u32,
    threshold: u64,
    activations: u64,
    flipped: bool,
}

/// A memory port backed by a vector of words.
///
/// Commands complete strictly in order, at most one per tick. A write
/// commits once its command reaches the queue front and a data beat is
/// available; a read produces its response after the configured latency.
pub struct SimPort {
    geometry: PortGeometry,
    mem: Vec<Word>,
    weak_cells: Vec<WeakCell>,
    cmds: VecDeque<InFlight>,
    beats: VecDeque<WriteBeat>,
    rdata: VecDeque<Word>,
    read_latency: u32,
    backpressure: Backpressure,
    rng: StdRng,
    cmd_ready: bool,
    wdata_ready: bool,
    log: Vec<Command>,
}

impl SimPort {
    /// Creates a port with one tick of read latency and no backpressure.
    pub fn new(geometry: PortGeometry) -> Self {
        Self::with_options(geometry, 1, Backpressure::None, 0)
    }

    /// Creates a port with explicit latency and backpressure behavior.
    ///
    /// The seed makes randomized backpressure reproducible.
    pub fn with_options(
        geometry: PortGeometry,
        read_latency: u32,
        backpressure: Backpressure,
        seed: u64,
    ) -> Self {
        debug!(
            "simulated port: {} words, read latency {}, {:?}",
            geometry.word_count(),
            read_latency,
            backpressure
        );
        SimPort {
            geometry,
            mem: vec![0; geometry.word_count() as usize],
            weak_cells: Vec::new(),
            cmds: VecDeque::new(),
            beats: VecDeque::new(),
            rdata: VecDeque::new(),
            read_latency,
            backpressure,
            rng: StdRng::seed_from_u64(seed),
            cmd_ready: true,
            wdata_ready: true,
            log: Vec::new(),
        }
    }

    /// The memory contents behind the port.
    pub fn memory(&self) -> &[Word] {
        &self.mem
    }

    /// The word stored at an address.
    pub fn word(&self, address: u32) -> Word {
        self.mem[address as usize]
    }

    /// XORs a flip mask into the word at an address, bypassing the port.
    ///
    /// This is the simulated counterpart of a disturbance-induced bit flip.
    pub fn flip_bits(&mut self, address: u32, mask: Word) {
        debug!("injecting flip at {:#x}, mask {:#018x}", address, mask);
        self.mem[address as usize] ^= mask;
    }

    /// Every command the port has accepted, in acceptance order.
    pub fn command_log(&self) -> &[Command] {
        &self.log
    }

    /// Plants a weak cell: once reads have activated `aggressor_row` at
    /// least `threshold` times, the mask is XORed into the victim word once.
    ///
    /// This models the disturbance a hammered row inflicts on its neighbor,
    /// which is what the attack phase is supposed to provoke.
    pub fn weaken(&mut self, victim: u32, mask: Word, aggressor_row: u32, threshold: u64) {
        debug!(
            "weak cell at {:#x} (mask {:#018x}), aggressor row {}, threshold {}",
            victim, mask, aggressor_row, threshold
        );
        self.weak_cells.push(WeakCell {
            victim,
            mask,
            aggressor_row,
            threshold,
            activations: 0,
            flipped: false,
        });
    }

    fn disturb(&mut self, read_address: u32) {
        let row = self.geometry.row_of(read_address);
        for cell in &mut self.weak_cells {
            if cell.aggressor_row != row || cell.flipped {
                continue;
            }
            cell.activations += 1;
            if cell.activations >= cell.threshold {
                debug!(
                    "weak cell at {:#x} flipped after {} activations of row {}",
                    cell.victim, cell.activations, cell.aggressor_row
                );
                self.mem[cell.victim as usize] ^= cell.mask;
                cell.flipped = true;
            }
        }
    }

    fn draw_ready(&mut self) -> bool {
        match self.backpressure {
            Backpressure::None => true,
            Backpressure::Random { deny_percent } => {
                self.rng.random_range(0..100u8) >= deny_percent
            }
        }
    }
}

fn apply_byte_enable(old: Word, beat: WriteBeat) -> Word {
    let mut mask: Word = 0;
    for byte in 0..(Word::BITS / 8) {
        if beat.byte_enable & (1 << byte) != 0 {
            mask |= 0xFF << (byte * 8);
        }
    }
    (old & !mask) | (beat.data & mask)
}

impl MemoryPort for SimPort {
    fn cmd_ready(&self) -> bool {
        self.cmd_ready && self.cmds.len() < QUEUE_DEPTH
    }

    fn issue(&mut self, cmd: Command) {
        trace!("accepted {:?}", cmd);
        self.log.push(cmd);
        self.cmds.push_back(InFlight { cmd, age: 0 });
    }

    fn wdata_ready(&self) -> bool {
        self.wdata_ready && self.beats.len() < QUEUE_DEPTH
    }

    fn push_write(&mut self, beat: WriteBeat) {
        self.beats.push_back(beat);
    }

    fn pop_read(&mut self) -> Option<Word> {
        self.rdata.pop_front()
    }

    fn tick(&mut self) {
        if let Some((cmd, age)) = self.cmds.front().map(|f| (f.cmd, f.age)) {
            if cmd.write {
                if let Some(beat) = self.beats.pop_front() {
                    let address = cmd.address as usize;
                    self.mem[address] = apply_byte_enable(self.mem[address], beat);
                    self.cmds.pop_front();
                }
            } else if age >= self.read_latency {
                self.disturb(cmd.address);
                self.rdata.push_back(self.mem[cmd.address as usize]);
                self.cmds.pop_front();
            } else if let Some(front) = self.cmds.front_mut() {
                front.age += 1;
            }
        }
        self.cmd_ready = self.draw_ready();
        self.wdata_ready = self.draw_ready();
    }
}

/// Simulated controller-side refresh and precharge state.
#[derive(Debug, Clone, Copy)]
pub struct SimRefresh {
    interval: u32,
    enabled: bool,
    auto_precharge: bool,
}

impl Default for SimRefresh {
    fn default() -> Self {
        SimRefresh {
            interval: DEFAULT_REFRESH_INTERVAL,
            enabled: true,
            auto_precharge: false,
        }
    }
}

impl RefreshControl for SimRefresh {
    fn refresh_interval(&self) -> u32 {
        self.interval
    }

    fn set_refresh_interval(&mut self, interval: u32) {
        debug!("refresh interval set to {}", interval);
        self.interval = interval;
    }

    fn refresh_enabled(&self) -> bool {
        self.enabled
    }

    fn set_refresh_enabled(&mut self, enabled: bool) {
        debug!("refresh {}", if enabled { "enabled" } else { "disabled" });
        self.enabled = enabled;
    }

    fn auto_precharge(&self) -> bool {
        self.auto_precharge
    }

    fn set_auto_precharge(&mut self, enabled: bool) {
        self.auto_precharge = enabled;
    }
}
