//! Register and flash-array access
//!
//! [`FlashRegisters`] is the only way the controller touches hardware. It
//! exposes register-level and word-level accessors and never hands out raw
//! pointers, so every access goes through one volatile, ordered path.
//! [`Mmio`] is the implementation for real silicon; tests substitute a
//! simulated block.

use crate::regs::{Register, FLASHSIZE_BASE, FLASH_BASE, FLASH_REG_BASE};

/// Access to the FLASH register block and the flash array it controls
///
/// Implementations must perform every call as exactly one access, in call
/// order, without caching: the hardware state machine changes registers
/// asynchronously.
pub trait FlashRegisters {
    /// Read a 32-bit register
    fn read_reg(&mut self, reg: Register) -> u32;

    /// Write a 32-bit register
    fn write_reg(&mut self, reg: Register, value: u32);

    /// Read the factory-programmed flash capacity, in KiB
    fn flash_size_kib(&mut self) -> u16;

    /// Store one 32-bit word into the flash array at byte `offset`
    ///
    /// `offset` is relative to the start of flash and 4-byte aligned.
    fn write_word(&mut self, offset: u32, word: u32);

    /// Copy `buf.len()` bytes of the flash array starting at `offset`
    fn read_memory(&mut self, offset: u32, buf: &mut [u8]);
}

/// Memory-mapped access to the on-chip FLASH peripheral
pub struct Mmio {
    regs: *mut u32,
    flash: *mut u8,
    size_fuse: *const u16,
}

impl Mmio {
    /// Access the FLASH peripheral at its fixed STM32G4 addresses
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - the code runs on an STM32G4 where these addresses are mapped
    /// - no other code accesses the FLASH register block while this handle
    ///   exists
    pub unsafe fn new() -> Self {
        unsafe { Self::with_addresses(FLASH_REG_BASE, FLASH_BASE, FLASHSIZE_BASE) }
    }

    /// Access a FLASH peripheral mapped at non-default addresses
    ///
    /// # Safety
    ///
    /// Same requirements as [`Mmio::new`], for the given addresses. All
    /// three must be aligned for their access width.
    pub unsafe fn with_addresses(reg_base: usize, flash_base: usize, size_fuse: usize) -> Self {
        Self {
            regs: reg_base as *mut u32,
            flash: flash_base as *mut u8,
            size_fuse: size_fuse as *const u16,
        }
    }

    #[inline]
    fn reg_ptr(&self, reg: Register) -> *mut u32 {
        // SAFETY: every Register offset lies inside the peripheral block
        unsafe { self.regs.byte_add(reg.offset()) }
    }
}

impl FlashRegisters for Mmio {
    #[inline]
    fn read_reg(&mut self, reg: Register) -> u32 {
        unsafe { core::ptr::read_volatile(self.reg_ptr(reg)) }
    }

    #[inline]
    fn write_reg(&mut self, reg: Register, value: u32) {
        unsafe { core::ptr::write_volatile(self.reg_ptr(reg), value) }
    }

    #[inline]
    fn flash_size_kib(&mut self) -> u16 {
        unsafe { core::ptr::read_volatile(self.size_fuse) }
    }

    #[inline]
    fn write_word(&mut self, offset: u32, word: u32) {
        debug_assert!(offset & 3 == 0, "unaligned flash word write");
        unsafe {
            core::ptr::write_volatile(self.flash.add(offset as usize) as *mut u32, word);
        }
    }

    fn read_memory(&mut self, offset: u32, buf: &mut [u8]) {
        let src = unsafe { self.flash.add(offset as usize) as *const u8 };
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = unsafe { core::ptr::read_volatile(src.add(i)) };
        }
    }
}

// The handle is the sole owner of the peripheral; moving it between
// contexts is fine as long as only one exists.
unsafe impl Send for Mmio {}
