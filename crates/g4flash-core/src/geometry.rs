//! Flash geometry and address arithmetic

use crate::config::PAGE_SIZE;

/// Size of one program unit (a double-word)
pub const DOUBLE_WORD: u32 = 8;

/// Page size and capacity of the flash array
///
/// `chip_size` is 0 until the capacity has been discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceGeometry {
    /// Erase granularity in bytes
    pub page_size: u32,
    /// Total capacity in bytes
    pub chip_size: u32,
}

impl DeviceGeometry {
    /// Geometry for a part whose capacity fuse reads `size_kib`
    pub const fn from_size_kib(size_kib: u16) -> Self {
        Self {
            page_size: PAGE_SIZE,
            chip_size: size_kib as u32 * 1024,
        }
    }

    /// Number of whole pages in the array
    pub const fn page_count(&self) -> u32 {
        self.chip_size / self.page_size
    }

    /// Round `addr` down to the start of its page
    pub const fn page_floor(&self, addr: u32) -> u32 {
        addr / self.page_size * self.page_size
    }

    /// Index of the page containing `addr`
    pub const fn page_index(&self, addr: u32) -> u32 {
        addr / self.page_size
    }

    /// Whether `len` bytes starting at `addr` lie inside the array
    pub fn contains(&self, addr: u32, len: usize) -> bool {
        (addr as u64)
            .checked_add(len as u64)
            .is_some_and(|end| end <= self.chip_size as u64)
    }

    /// Whether `pages` whole pages starting at `addr` lie inside the array
    ///
    /// `addr` must already be page aligned.
    pub fn contains_pages(&self, addr: u32, pages: u32) -> bool {
        (addr as u64) + (pages as u64) * (self.page_size as u64) <= self.chip_size as u64
    }
}

/// Round a byte count up to whole double-words
pub const fn round_up_double_words(len: usize) -> usize {
    len.div_ceil(DOUBLE_WORD as usize) * DOUBLE_WORD as usize
}
