//! g4flash-sim - Simulated STM32G4 flash peripheral
//!
//! This crate provides [`SimFlash`], an in-memory model of the FLASH
//! register block and the flash array behind it. It implements
//! [`FlashRegisters`], so a [`FlashController`](g4flash_core::FlashController)
//! runs against it unchanged. Useful for testing and for host tools that
//! work on flash images.
//!
//! The model follows the hardware closely enough to catch protocol
//! mistakes:
//!
//! - CR starts locked and ignores writes until KEY1, KEY2 are written to
//!   KEYR. A wrong key locks it until [`SimFlash::reset`].
//! - Page erase starts on STRT with PER set; programming starts on the
//!   second word of a double-word with PG set.
//! - Programming a double-word that is not erased sets PROGERR, unless the
//!   value written is all zeros.
//! - The busy flag stays up for a configurable number of SR reads after an
//!   operation starts, or forever with [`BusyMode::Stuck`].
//!
//! Every access is recorded, so tests can assert on exact register
//! sequences.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use g4flash_core::regs::{cr_pnb_mask, Control, Register, Status, CR_PNB_SHIFT};
use g4flash_core::regs::{FLASH_KEY1, FLASH_KEY2};
use g4flash_core::{FlashRegisters, PAGE_SIZE};


/// Erased value of a flash byte
pub const ERASED: u8 = 0xFF;

/// Reset value of CR
const CR_RESET: u32 = Control::LOCK.bits() | Control::OPTLOCK.bits();
/// SR bits cleared by writing 1
const SR_W1C: u32 = Status::EOP.bits() | Status::ERRORS.bits();
/// Register file spans offsets 0x00..=0x70
const REG_WORDS: usize = 0x70 / 4 + 1;

/// How the busy flag behaves once an operation starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyMode {
    /// Operations complete instantly; BSY is never seen
    Idle,
    /// BSY reads as set for this many SR reads
    Polls(u32),
    /// BSY never clears
    Stuck,
}

/// Configuration for the simulated part
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Value of the flash size fuse, in KiB
    pub size_kib: u16,
    /// Busy-flag behaviour
    pub busy: BusyMode,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            size_kib: 0x0080, // 128 KiB, STM32G431xB
            busy: BusyMode::Polls(3),
        }
    }
}

/// One access made through [`FlashRegisters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Register read, with the value returned
    ReadReg(Register, u32),
    /// Register write
    WriteReg(Register, u32),
    /// Flash size fuse read
    ReadSizeFuse,
    /// Word store into the flash array
    WriteWord {
        /// Byte offset from the start of flash
        offset: u32,
        /// Value stored
        word: u32,
    },
    /// Linear read of the flash array
    ReadMemory {
        /// Byte offset from the start of flash
        offset: u32,
        /// Bytes read
        len: usize,
    },
}

impl Access {
    /// Whether this access changes register or array state
    pub fn is_write(&self) -> bool {
        matches!(self, Access::WriteReg(..) | Access::WriteWord { .. })
    }
}

/// Progress through the KEYR unlock sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyState {
    Locked,
    Key1,
    Unlocked,
    /// Wrong sequence; stays locked until reset
    Faulted,
}

/// Simulated FLASH peripheral
pub struct SimFlash {
    config: SimConfig,
    data: Vec<u8>,
    regs: [u32; REG_WORDS],
    keys: KeyState,
    /// Low word of a double-word waiting for its high word
    latched: Option<(u32, u32)>,
    busy_polls: u32,
    stuck: bool,
    accesses: Vec<Access>,
}

impl SimFlash {
    /// Create an erased part with the given configuration
    pub fn new(config: SimConfig) -> Self {
        let size = usize::from(config.size_kib) * 1024;
        let mut sim = Self {
            config,
            data: vec![ERASED; size],
            regs: [0; REG_WORDS],
            keys: KeyState::Locked,
            latched: None,
            busy_polls: 0,
            stuck: false,
            accesses: Vec::new(),
        };
        sim.reset();
        sim
    }

    /// Create an erased 128 KiB part
    pub fn new_default() -> Self {
        Self::new(SimConfig::default())
    }

    /// Create a part with pre-filled flash contents
    pub fn with_data(config: SimConfig, initial_data: &[u8]) -> Self {
        let mut sim = Self::new(config);
        let len = core::cmp::min(initial_data.len(), sim.data.len());
        sim.data[..len].copy_from_slice(&initial_data[..len]);
        sim
    }

    /// Reset the register block: CR locked, SR clear, key sequence restarted
    ///
    /// Flash contents and the access log are kept.
    pub fn reset(&mut self) {
        self.regs = [0; REG_WORDS];
        self.set_reg(Register::Cr, CR_RESET);
        self.keys = KeyState::Locked;
        self.latched = None;
        self.busy_polls = 0;
        self.stuck = false;
    }

    /// Get the configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Change how the busy flag behaves for subsequent operations
    pub fn set_busy_mode(&mut self, busy: BusyMode) {
        self.config.busy = busy;
    }

    /// Raise BSY immediately, as if an operation were already in flight
    pub fn force_busy(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Register value, without recording an access or advancing BSY
    pub fn peek(&self, reg: Register) -> u32 {
        self.regs[reg.offset() / 4]
    }

    /// Recorded accesses, oldest first
    pub fn accesses(&self) -> &[Access] {
        &self.accesses
    }

    /// Forget recorded accesses
    pub fn clear_accesses(&mut self) {
        self.accesses.clear();
    }

    /// Recorded accesses that change state
    pub fn writes(&self) -> Vec<Access> {
        self.accesses.iter().copied().filter(Access::is_write).collect()
    }

    /// Number of recorded reads of `reg`
    pub fn reads_of(&self, reg: Register) -> usize {
        self.accesses
            .iter()
            .filter(|a| matches!(a, Access::ReadReg(r, _) if *r == reg))
            .count()
    }

    fn set_reg(&mut self, reg: Register, value: u32) {
        self.regs[reg.offset() / 4] = value;
    }

    fn is_locked(&self) -> bool {
        self.peek(Register::Cr) & Control::LOCK.bits() != 0
    }

    fn flag(&mut self, flags: Status) {
        let sr = self.peek(Register::Sr) | flags.bits();
        self.set_reg(Register::Sr, sr);
    }

    fn start_busy(&mut self) {
        match self.config.busy {
            BusyMode::Idle => {}
            BusyMode::Polls(n) => self.busy_polls = n,
            BusyMode::Stuck => self.stuck = true,
        }
    }

    fn read_status(&mut self) -> u32 {
        let sr = self.peek(Register::Sr);
        if self.stuck {
            sr | Status::BSY.bits()
        } else if self.busy_polls > 0 {
            self.busy_polls -= 1;
            sr | Status::BSY.bits()
        } else {
            sr
        }
    }

    fn write_key(&mut self, value: u32) {
        self.keys = match (self.keys, value) {
            (KeyState::Locked, FLASH_KEY1) => KeyState::Key1,
            (KeyState::Key1, FLASH_KEY2) => {
                let cr = self.peek(Register::Cr) & !Control::LOCK.bits();
                self.set_reg(Register::Cr, cr);
                KeyState::Unlocked
            }
            (KeyState::Unlocked, _) => {
                // Key written while unlocked: bus error, locked until reset
                let cr = self.peek(Register::Cr) | Control::LOCK.bits();
                self.set_reg(Register::Cr, cr);
                KeyState::Faulted
            }
            _ => KeyState::Faulted,
        };
    }

    fn write_control(&mut self, value: u32) {
        if self.is_locked() {
            return;
        }

        let requested = Control::from_bits_retain(value);
        if requested.contains(Control::LOCK) {
            self.keys = KeyState::Locked;
            self.latched = None;
        }

        // STRT self-clears once the operation is launched
        self.set_reg(Register::Cr, value & !Control::STRT.bits());

        if requested.contains(Control::STRT) {
            if requested.contains(Control::PER) && !requested.contains(Control::PG) {
                let page_count = (self.data.len() / PAGE_SIZE as usize) as u32;
                let page = (value >> CR_PNB_SHIFT) & cr_pnb_mask(page_count);
                self.erase_page(page);
            } else {
                self.flag(Status::PGSERR);
            }
        }
    }

    fn erase_page(&mut self, page: u32) {
        let start = page as usize * PAGE_SIZE as usize;
        let end = start + PAGE_SIZE as usize;
        if end > self.data.len() {
            self.flag(Status::OPERR);
            return;
        }
        log::trace!("sim: erase page {}", page);
        self.data[start..end].fill(ERASED);
        self.start_busy();
    }

    fn store_word(&mut self, offset: u32, word: u32) {
        let cr = Control::from_bits_retain(self.peek(Register::Cr));
        if self.is_locked() || !cr.contains(Control::PG) || cr.contains(Control::PER) {
            self.latched = None;
            self.flag(Status::PGSERR);
            return;
        }

        match (offset % 8, self.latched.take()) {
            (0, None) => self.latched = Some((offset, word)),
            (4, Some((low_offset, low))) if low_offset + 4 == offset => {
                self.program_double_word(low_offset, low, word);
            }
            _ => self.flag(Status::PGAERR),
        }
    }

    fn program_double_word(&mut self, offset: u32, low: u32, high: u32) {
        let start = offset as usize;
        let end = start + 8;
        if end > self.data.len() {
            self.flag(Status::OPERR);
            return;
        }

        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&low.to_le_bytes());
        bytes[4..].copy_from_slice(&high.to_le_bytes());

        let erased = self.data[start..end].iter().all(|&b| b == ERASED);
        if !erased && bytes != [0u8; 8] {
            self.flag(Status::PROGERR);
            return;
        }

        log::trace!("sim: program {:#010x} = {:02x?}", offset, bytes);
        // Flash programming: can only change 1 -> 0
        for (cell, byte) in self.data[start..end].iter_mut().zip(bytes) {
            *cell &= byte;
        }
        self.start_busy();
    }
}

impl FlashRegisters for SimFlash {
    fn read_reg(&mut self, reg: Register) -> u32 {
        let value = match reg {
            Register::Sr => self.read_status(),
            // Write-only key registers read as zero
            Register::Keyr | Register::Pdkeyr | Register::Optkeyr => 0,
            _ => self.peek(reg),
        };
        self.accesses.push(Access::ReadReg(reg, value));
        value
    }

    fn write_reg(&mut self, reg: Register, value: u32) {
        self.accesses.push(Access::WriteReg(reg, value));
        match reg {
            Register::Keyr => self.write_key(value),
            Register::Sr => {
                let sr = self.peek(Register::Sr) & !(value & SR_W1C);
                self.set_reg(Register::Sr, sr);
            }
            Register::Cr => self.write_control(value),
            // Option bytes and protection registers need OPTKEYR; not modelled
            _ => {}
        }
    }

    fn flash_size_kib(&mut self) -> u16 {
        self.accesses.push(Access::ReadSizeFuse);
        self.config.size_kib
    }

    fn write_word(&mut self, offset: u32, word: u32) {
        self.accesses.push(Access::WriteWord { offset, word });
        self.store_word(offset, word);
    }

    fn read_memory(&mut self, offset: u32, buf: &mut [u8]) {
        self.accesses.push(Access::ReadMemory {
            offset,
            len: buf.len(),
        });
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlock(sim: &mut SimFlash) {
        sim.write_reg(Register::Keyr, FLASH_KEY1);
        sim.write_reg(Register::Keyr, FLASH_KEY2);
    }

    #[test]
    fn test_reset_state() {
        let sim = SimFlash::new_default();
        assert_eq!(sim.data().len(), 128 * 1024);
        assert!(sim.data().iter().all(|&b| b == ERASED));
        assert!(sim.is_locked());
        assert_eq!(sim.peek(Register::Sr), 0);
    }

    #[test]
    fn test_key_sequence_unlocks() {
        let mut sim = SimFlash::new_default();
        unlock(&mut sim);
        assert!(!sim.is_locked());
    }

    #[test]
    fn test_wrong_key_locks_until_reset() {
        let mut sim = SimFlash::new_default();
        sim.write_reg(Register::Keyr, FLASH_KEY2);
        unlock(&mut sim);
        assert!(sim.is_locked());

        sim.reset();
        unlock(&mut sim);
        assert!(!sim.is_locked());
    }

    #[test]
    fn test_locked_cr_ignores_writes() {
        let mut sim = SimFlash::new_default();
        sim.write_reg(Register::Cr, Control::PG.bits());
        assert_eq!(sim.peek(Register::Cr), CR_RESET);
    }

    #[test]
    fn test_sr_write_one_to_clear() {
        let mut sim = SimFlash::new_default();
        sim.flag(Status::PGSERR | Status::PROGERR);
        sim.write_reg(Register::Sr, Status::PGSERR.bits());
        assert_eq!(sim.peek(Register::Sr), Status::PROGERR.bits());
        sim.write_reg(Register::Sr, 0x83FF);
        assert_eq!(sim.peek(Register::Sr), 0);
    }

    #[test]
    fn test_busy_polls_count_down() {
        let mut sim = SimFlash::new(SimConfig {
            busy: BusyMode::Polls(2),
            ..SimConfig::default()
        });
        unlock(&mut sim);
        sim.write_reg(Register::Cr, (Control::PER | Control::STRT).bits());
        assert_ne!(sim.read_reg(Register::Sr) & Status::BSY.bits(), 0);
        assert_ne!(sim.read_reg(Register::Sr) & Status::BSY.bits(), 0);
        assert_eq!(sim.read_reg(Register::Sr) & Status::BSY.bits(), 0);
    }

    #[test]
    fn test_program_requires_pg() {
        let mut sim = SimFlash::new_default();
        unlock(&mut sim);
        sim.write_word(0, 0);
        sim.write_word(4, 0);
        assert_eq!(sim.peek(Register::Sr) & Status::PGSERR.bits(), Status::PGSERR.bits());
        assert!(sim.data()[..8].iter().all(|&b| b == ERASED));
    }

    #[test]
    fn test_program_needs_low_word_first() {
        let mut sim = SimFlash::new_default();
        unlock(&mut sim);
        sim.write_reg(Register::Cr, Control::PG.bits());
        sim.write_word(4, 0x1234_5678);
        assert_eq!(sim.peek(Register::Sr) & Status::PGAERR.bits(), Status::PGAERR.bits());
        assert!(sim.data()[..8].iter().all(|&b| b == ERASED));
    }

    #[test]
    fn test_program_rejects_dirty_double_word() {
        let mut data = vec![ERASED; 16];
        data[0] = 0x00;
        let mut sim = SimFlash::with_data(SimConfig::default(), &data);
        unlock(&mut sim);
        sim.write_reg(Register::Cr, Control::PG.bits());
        sim.write_word(0, 0x1111_1111);
        sim.write_word(4, 0x2222_2222);
        assert_eq!(sim.peek(Register::Sr) & Status::PROGERR.bits(), Status::PROGERR.bits());
        assert_eq!(sim.data()[1], ERASED);
    }

    #[test]
    fn test_access_log() {
        let mut sim = SimFlash::new_default();
        sim.read_reg(Register::Cr);
        sim.write_reg(Register::Sr, 0x83FF);
        assert_eq!(
            sim.accesses(),
            &[
                Access::ReadReg(Register::Cr, CR_RESET),
                Access::WriteReg(Register::Sr, 0x83FF),
            ]
        );
        assert_eq!(sim.writes(), vec![Access::WriteReg(Register::Sr, 0x83FF)]);
        sim.clear_accesses();
        assert!(sim.accesses().is_empty());
    }
}
