//! STM32G4 flash controller driver
//!
//! [`FlashController`] drives the FLASH peripheral through the sequences
//! given in the reference manual:
//!
//! - **Unlock**: KEY1 then KEY2 written to KEYR clears CR.LOCK. Any other
//!   sequence keeps the controller locked until the next reset.
//! - **Page erase**: PER, the page number and STRT are set together; the
//!   busy flag is then polled until the page is erased.
//! - **Program**: with PG set, a double-word is written to its destination
//!   as two word stores, low word first. The second store starts the
//!   program cycle.
//! - **Read**: the array is memory mapped and read directly.
//!
//! Erase and program poll the busy flag for a bounded number of iterations
//! (see [`FlashConfig`]). The enable bit of the operation is always cleared
//! before returning, including on timeout, and units completed before a
//! failure stay committed.
//!
//! Erase and program do not unlock the controller. Callers unlock, perform
//! their operations, then lock again, or use [`FlashController::unlocked`].
//!
//! The controller does not serialize concurrent callers. Every operation
//! takes `&mut self`; sharing one controller between execution contexts
//! needs a mutex around it at the integration boundary.

use core::ops::{Deref, DerefMut};

use crate::config::{FlashConfig, PAGE_SIZE};
use crate::error::{Error, Result};
use crate::geometry::{round_up_double_words, DeviceGeometry, DOUBLE_WORD};
use crate::hal::FlashRegisters;
use crate::regs::{
    cr_pnb, cr_pnb_mask, Control, Register, Status, CR_PNB_SHIFT, FLASH_KEY1, FLASH_KEY2,
    SR_CLEAR_ALL,
};

/// Driver for the on-chip flash controller
pub struct FlashController<R: FlashRegisters> {
    /// Register block and flash array
    regs: R,
    /// Poll budgets
    config: FlashConfig,
    /// Capacity in bytes, 0 until discovered
    chip_size: u32,
}

impl<R: FlashRegisters> FlashController<R> {
    /// Create a controller with default poll budgets
    ///
    /// No hardware is accessed until the first operation.
    pub fn new(regs: R) -> Self {
        Self::with_config(regs, FlashConfig::default())
    }

    /// Create a controller with explicit poll budgets
    pub fn with_config(regs: R, config: FlashConfig) -> Self {
        Self {
            regs,
            config,
            chip_size: 0,
        }
    }

    /// Discover and cache the chip capacity
    ///
    /// Reads the factory-programmed size fuse. Calling this again after the
    /// capacity is known does nothing. Every other operation calls this on
    /// first use, so an explicit call is optional.
    pub fn init(&mut self) -> Result<()> {
        if self.chip_size == 0 {
            let size_kib = self.regs.flash_size_kib();
            self.chip_size = u32::from(size_kib) * 1024;
            log::debug!(
                "Flash size: {} KiB ({} pages of {} bytes)",
                size_kib,
                self.chip_size / PAGE_SIZE,
                PAGE_SIZE
            );
        }
        Ok(())
    }

    /// Unlock CR so that erase and program operations are accepted
    ///
    /// Does nothing if CR is already unlocked: writing a key to an unlocked
    /// controller is a sequence error that locks it until reset.
    pub fn unlock(&mut self) -> Result<()> {
        if !self.is_locked() {
            log::trace!("FLASH_CR already unlocked");
            return Ok(());
        }

        self.regs.write_reg(Register::Keyr, FLASH_KEY1);
        self.regs.write_reg(Register::Keyr, FLASH_KEY2);

        if self.is_locked() {
            log::warn!("FLASH_CR still locked after key sequence");
        } else {
            log::debug!("FLASH_CR unlocked");
        }
        Ok(())
    }

    /// Lock CR, rejecting erase and program until the next unlock
    pub fn lock(&mut self) -> Result<()> {
        let cr = self.control();
        if cr.contains(Control::LOCK) {
            return Ok(());
        }

        self.regs.write_reg(Register::Cr, (cr | Control::LOCK).bits());
        log::debug!("FLASH_CR locked");
        Ok(())
    }

    /// Erase `pages` consecutive pages, starting with the page containing
    /// `addr`
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the pages extend past the end of
    ///   flash, or the controller is busy or locked. Nothing is written.
    /// - [`Error::Timeout`] if a page did not finish within the erase
    ///   budget. Pages before it stay erased.
    pub fn erase(&mut self, addr: u32, pages: u32) -> Result<()> {
        self.init()?;
        let geometry = self.geometry();

        let start = geometry.page_floor(addr);
        if !geometry.contains_pages(start, pages) {
            log::debug!(
                "Erase of {} page(s) at {:#010x} exceeds flash size {:#x}",
                pages,
                start,
                geometry.chip_size
            );
            return Err(Error::InvalidArgument);
        }

        let first = geometry.page_index(start);
        let pnb_field = cr_pnb_mask(geometry.page_count()) << CR_PNB_SHIFT;

        self.check_ready()?;

        for page in first..first + pages {
            log::trace!("Erasing page {} ({:#010x})", page, page * geometry.page_size);

            self.clear_status();
            let cr = self.regs.read_reg(Register::Cr) & !pnb_field;
            self.regs.write_reg(
                Register::Cr,
                cr | cr_pnb(page) | (Control::PER | Control::STRT).bits(),
            );

            let status = self.wait_not_busy(self.config.erase_timeout);
            self.end_operation(Control::PER);

            match status {
                Some(sr) => self.report_errors(sr, page * geometry.page_size),
                None => {
                    log::warn!(
                        "Erase of page {} timed out after {} polls",
                        page,
                        self.config.erase_timeout
                    );
                    return Err(Error::Timeout);
                }
            }
        }

        Ok(())
    }

    /// Program `data` at `addr`, one double-word at a time
    ///
    /// `addr` must be 8-byte aligned and the target region erased. A
    /// trailing partial double-word is padded with 0xFF, which leaves the
    /// padded cells erased.
    ///
    /// Returns the number of bytes programmed, rounded up to whole
    /// double-words.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `addr` is unaligned, the data extends
    ///   past the end of flash, or the controller is busy or locked.
    ///   Nothing is written.
    /// - [`Error::Timeout`] if a double-word did not finish within the
    ///   program budget. Double-words before it stay programmed.
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<usize> {
        self.init()?;
        let geometry = self.geometry();

        if addr % DOUBLE_WORD != 0 {
            log::debug!("Write address {:#010x} is not double-word aligned", addr);
            return Err(Error::InvalidArgument);
        }
        if !geometry.contains(addr, data.len()) {
            log::debug!(
                "Write of {} bytes at {:#010x} exceeds flash size {:#x}",
                data.len(),
                addr,
                geometry.chip_size
            );
            return Err(Error::InvalidArgument);
        }

        self.check_ready()?;

        let mut offset = addr;
        for chunk in data.chunks(DOUBLE_WORD as usize) {
            let mut unit = [0xFFu8; DOUBLE_WORD as usize];
            unit[..chunk.len()].copy_from_slice(chunk);
            let low = u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]);
            let high = u32::from_le_bytes([unit[4], unit[5], unit[6], unit[7]]);

            self.clear_status();
            let cr = self.regs.read_reg(Register::Cr);
            self.regs.write_reg(Register::Cr, cr | Control::PG.bits());

            // The high word starts the program cycle
            self.regs.write_word(offset, low);
            self.regs.write_word(offset + 4, high);

            let status = self.wait_not_busy(self.config.program_timeout);
            self.end_operation(Control::PG);

            match status {
                Some(sr) => self.report_errors(sr, offset),
                None => {
                    log::warn!(
                        "Program at {:#010x} timed out after {} polls ({} bytes committed)",
                        offset,
                        self.config.program_timeout,
                        offset - addr
                    );
                    return Err(Error::Timeout);
                }
            }

            offset += DOUBLE_WORD;
        }

        Ok(round_up_double_words(data.len()))
    }

    /// Copy flash contents starting at `addr` into `buf`
    ///
    /// No busy check is made; reading while an erase or program is in
    /// flight is the caller's responsibility to avoid.
    ///
    /// Returns the number of bytes read.
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<usize> {
        self.init()?;

        if !self.geometry().contains(addr, buf.len()) {
            log::debug!(
                "Read of {} bytes at {:#010x} exceeds flash size {:#x}",
                buf.len(),
                addr,
                self.chip_size
            );
            return Err(Error::InvalidArgument);
        }

        self.regs.read_memory(addr, buf);
        Ok(buf.len())
    }

    /// Unlock and return a guard that locks again when dropped
    pub fn unlocked(&mut self) -> Result<Unlocked<'_, R>> {
        self.unlock()?;
        Ok(Unlocked { flash: self })
    }

    /// Erase granularity in bytes
    pub fn page_size(&self) -> u32 {
        PAGE_SIZE
    }

    /// Capacity in bytes, or 0 if not yet discovered
    pub fn chip_size(&self) -> u32 {
        self.chip_size
    }

    /// Current geometry
    pub fn geometry(&self) -> DeviceGeometry {
        DeviceGeometry {
            page_size: PAGE_SIZE,
            chip_size: self.chip_size,
        }
    }

    /// Poll budgets in use
    pub fn config(&self) -> &FlashConfig {
        &self.config
    }

    /// Whether CR is locked
    pub fn is_locked(&mut self) -> bool {
        self.control().contains(Control::LOCK)
    }

    /// Current status register flags
    pub fn status(&mut self) -> Status {
        Status::from_bits_retain(self.regs.read_reg(Register::Sr))
    }

    /// Borrow the register access layer
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Mutably borrow the register access layer
    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Release the register access layer
    pub fn into_inner(self) -> R {
        self.regs
    }

    fn control(&mut self) -> Control {
        Control::from_bits_retain(self.regs.read_reg(Register::Cr))
    }

    fn clear_status(&mut self) {
        self.regs.write_reg(Register::Sr, SR_CLEAR_ALL);
    }

    /// Reject the operation if the controller cannot accept it
    fn check_ready(&mut self) -> Result<()> {
        if self.status().contains(Status::BSY) {
            log::debug!("Flash controller is busy");
            return Err(Error::InvalidArgument);
        }
        if self.is_locked() {
            log::debug!("Flash controller is locked");
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Spin on SR.BSY for at most `budget` reads
    ///
    /// Returns the first status read with BSY clear, or `None` when the
    /// budget ran out.
    fn wait_not_busy(&mut self, budget: u32) -> Option<Status> {
        for _ in 0..budget {
            let sr = self.status();
            if !sr.contains(Status::BSY) {
                return Some(sr);
            }
        }
        None
    }

    /// Clear status flags and drop the operation's enable bit
    fn end_operation(&mut self, enable: Control) {
        self.clear_status();
        let cr = self.regs.read_reg(Register::Cr);
        self.regs.write_reg(Register::Cr, cr & !enable.bits());
    }

    fn report_errors(&self, sr: Status, addr: u32) {
        let errors = sr & Status::ERRORS;
        if !errors.is_empty() {
            log::warn!("Flash error flags {:?} at {:#010x}", errors, addr);
        }
    }
}

/// Guard returned by [`FlashController::unlocked`]
///
/// Dereferences to the controller and locks it when dropped.
pub struct Unlocked<'a, R: FlashRegisters> {
    flash: &'a mut FlashController<R>,
}

impl<R: FlashRegisters> Deref for Unlocked<'_, R> {
    type Target = FlashController<R>;

    fn deref(&self) -> &Self::Target {
        self.flash
    }
}

impl<R: FlashRegisters> DerefMut for Unlocked<'_, R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.flash
    }
}

impl<R: FlashRegisters> Drop for Unlocked<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.flash.lock() {
            log::warn!("Failed to re-lock flash: {}", e);
        }
    }
}
