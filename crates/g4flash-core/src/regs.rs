//! STM32G4 FLASH register definitions
//!
//! Register offsets and bit definitions for the embedded flash interface,
//! taken from the STM32G4 reference manual (RM0440, section 3.7).

use bitflags::bitflags;

// ============================================================================
// Fixed addresses
// ============================================================================

/// Base address of the FLASH register block
pub const FLASH_REG_BASE: usize = 0x4002_2000;
/// Linear address where page 0 of main flash begins
pub const FLASH_BASE: usize = 0x0800_0000;
/// Factory-programmed flash size in KiB (16 bits, read-only)
pub const FLASHSIZE_BASE: usize = 0x1FFF_75E0;

// ============================================================================
// Unlock keys
// ============================================================================

/// First key written to KEYR
pub const FLASH_KEY1: u32 = 0x4567_0123;
/// Second key written to KEYR
pub const FLASH_KEY2: u32 = 0xCDEF_89AB;

// ============================================================================
// Register offsets
// ============================================================================

/// Registers of the FLASH block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Access control register
    Acr,
    /// Power-down key register
    Pdkeyr,
    /// Key register
    Keyr,
    /// Option key register
    Optkeyr,
    /// Status register
    Sr,
    /// Control register
    Cr,
    /// ECC register
    Eccr,
    /// Option register
    Optr,
    /// Bank 1 PCROP start address register
    Pcrop1sr,
    /// Bank 1 PCROP end address register
    Pcrop1er,
    /// Bank 1 WRP area A address register
    Wrp1ar,
    /// Bank 1 WRP area B address register
    Wrp1br,
    /// Securable memory register bank 1
    Sec1r,
}

impl Register {
    /// All registers, in address order
    pub const ALL: [Register; 13] = [
        Register::Acr,
        Register::Pdkeyr,
        Register::Keyr,
        Register::Optkeyr,
        Register::Sr,
        Register::Cr,
        Register::Eccr,
        Register::Optr,
        Register::Pcrop1sr,
        Register::Pcrop1er,
        Register::Wrp1ar,
        Register::Wrp1br,
        Register::Sec1r,
    ];

    /// Byte offset from [`FLASH_REG_BASE`]
    pub const fn offset(self) -> usize {
        match self {
            Register::Acr => 0x00,
            Register::Pdkeyr => 0x04,
            Register::Keyr => 0x08,
            Register::Optkeyr => 0x0C,
            Register::Sr => 0x10,
            Register::Cr => 0x14,
            Register::Eccr => 0x18,
            Register::Optr => 0x20,
            Register::Pcrop1sr => 0x24,
            Register::Pcrop1er => 0x28,
            Register::Wrp1ar => 0x2C,
            Register::Wrp1br => 0x30,
            Register::Sec1r => 0x70,
        }
    }

    /// Register name as printed in the reference manual
    pub const fn name(self) -> &'static str {
        match self {
            Register::Acr => "ACR",
            Register::Pdkeyr => "PDKEYR",
            Register::Keyr => "KEYR",
            Register::Optkeyr => "OPTKEYR",
            Register::Sr => "SR",
            Register::Cr => "CR",
            Register::Eccr => "ECCR",
            Register::Optr => "OPTR",
            Register::Pcrop1sr => "PCROP1SR",
            Register::Pcrop1er => "PCROP1ER",
            Register::Wrp1ar => "WRP1AR",
            Register::Wrp1br => "WRP1BR",
            Register::Sec1r => "SEC1R",
        }
    }
}

// ============================================================================
// SR bits
// ============================================================================

bitflags! {
    /// FLASH status register (SR)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u32 {
        /// End of operation
        const EOP     = 1 << 0;
        /// Operation error
        const OPERR   = 1 << 1;
        /// Programming error
        const PROGERR = 1 << 3;
        /// Write protection error
        const WRPERR  = 1 << 4;
        /// Programming alignment error
        const PGAERR  = 1 << 5;
        /// Size error
        const SIZERR  = 1 << 6;
        /// Programming sequence error
        const PGSERR  = 1 << 7;
        /// Fast programming data miss error
        const MISERR  = 1 << 8;
        /// Fast programming error
        const FASTERR = 1 << 9;
        /// PCROP read error
        const RDERR   = 1 << 14;
        /// Option validity error
        const OPTVERR = 1 << 15;
        /// Busy
        const BSY     = 1 << 16;

        /// Every error flag
        const ERRORS = Self::OPERR.bits()
            | Self::PROGERR.bits()
            | Self::WRPERR.bits()
            | Self::PGAERR.bits()
            | Self::SIZERR.bits()
            | Self::PGSERR.bits()
            | Self::MISERR.bits()
            | Self::FASTERR.bits()
            | Self::RDERR.bits()
            | Self::OPTVERR.bits();
    }
}

/// Value written to SR to clear every write-1-to-clear flag
pub const SR_CLEAR_ALL: u32 = 0x83FF;

// ============================================================================
// CR bits
// ============================================================================

bitflags! {
    /// FLASH control register (CR)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Control: u32 {
        /// Programming
        const PG         = 1 << 0;
        /// Page erase
        const PER        = 1 << 1;
        /// Mass erase
        const MER1       = 1 << 2;
        /// Start erase operation
        const STRT       = 1 << 16;
        /// Options modification start
        const OPTSTRT    = 1 << 17;
        /// Fast programming
        const FSTPG      = 1 << 18;
        /// End of operation interrupt enable
        const EOPIE      = 1 << 24;
        /// Error interrupt enable
        const ERRIE      = 1 << 25;
        /// PCROP read error interrupt enable
        const RDERRIE    = 1 << 26;
        /// Force option byte loading
        const OBL_LAUNCH = 1 << 27;
        /// Securable memory area protection
        const SEC_PROT1  = 1 << 28;
        /// Option bytes lock
        const OPTLOCK    = 1 << 30;
        /// FLASH_CR lock
        const LOCK       = 1 << 31;
    }
}

/// Page number field (PNB) position in CR
pub const CR_PNB_SHIFT: u32 = 3;
/// Page number field (PNB) mask in CR, before shifting (bits 3-8)
pub const CR_PNB_MASK: u32 = 0x3F;

/// PNB mask, before shifting, for a part with `page_count` pages
///
/// Bits 3-8 on parts with up to 64 pages; wider on larger parts so that
/// every page stays addressable.
pub const fn cr_pnb_mask(page_count: u32) -> u32 {
    let needed = match page_count.checked_next_power_of_two() {
        Some(n) => n - 1,
        None => u32::MAX >> CR_PNB_SHIFT,
    };
    if needed > CR_PNB_MASK {
        needed
    } else {
        CR_PNB_MASK
    }
}

/// Encode a page index into the CR page number field
pub const fn cr_pnb(page: u32) -> u32 {
    page << CR_PNB_SHIFT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_offsets_match_reference_manual() {
        assert_eq!(Register::Keyr.offset(), 0x08);
        assert_eq!(Register::Sr.offset(), 0x10);
        assert_eq!(Register::Cr.offset(), 0x14);
        assert_eq!(Register::Optr.offset(), 0x20);
        assert_eq!(Register::Sec1r.offset(), 0x70);
    }

    #[test]
    fn test_register_offsets_are_ordered_and_word_aligned() {
        for pair in Register::ALL.windows(2) {
            assert!(pair[0].offset() < pair[1].offset());
        }
        assert!(Register::ALL.iter().all(|r| r.offset() % 4 == 0));
    }

    #[test]
    fn test_status_bits() {
        assert_eq!(Status::BSY.bits(), 0x0001_0000);
        // SR_CLEAR_ALL covers EOP and every error flag except RDERR
        assert!(Status::from_bits_retain(SR_CLEAR_ALL).contains(Status::EOP | Status::OPTVERR));
        assert!(!Status::from_bits_retain(SR_CLEAR_ALL).contains(Status::BSY));
    }

    #[test]
    fn test_page_number_encoding() {
        assert_eq!(cr_pnb(0), 0);
        assert_eq!(cr_pnb(1), 0x8);
        assert_eq!(cr_pnb(63), 0x3F << 3);
        assert_eq!(cr_pnb(200), 200 << 3);
    }

    #[test]
    fn test_page_number_field_width() {
        // 128 KiB / 2 KiB
        assert_eq!(cr_pnb_mask(64), 0x3F);
        assert_eq!(cr_pnb_mask(1), 0x3F);
        // 512 KiB / 2 KiB needs bits 3-10
        assert_eq!(cr_pnb_mask(256), 0xFF);
        assert_eq!(cr_pnb_mask(65), 0x7F);
    }

    #[test]
    fn test_control_bits() {
        assert_eq!(Control::PG.bits(), 0x1);
        assert_eq!(Control::PER.bits(), 0x2);
        assert_eq!(Control::STRT.bits(), 0x1_0000);
        assert_eq!(Control::LOCK.bits(), 0x8000_0000);
    }
}
