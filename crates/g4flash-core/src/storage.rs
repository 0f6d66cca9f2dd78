//! `embedded-storage` NOR flash traits
//!
//! Lets key-value stores and filesystems written against `embedded-storage`
//! sit directly on the controller. The traits do not unlock; callers do
//! that first, as with the inherent methods.
//!
//! `capacity()` takes `&self` and cannot discover the size lazily, so it
//! reports 0 until [`FlashController::init`] or another operation has run.

use embedded_storage::nor_flash::{ErrorType, NorFlash, ReadNorFlash};

use crate::config::PAGE_SIZE;
use crate::controller::FlashController;
use crate::error::Error;
use crate::geometry::DOUBLE_WORD;
use crate::hal::FlashRegisters;

impl<R: FlashRegisters> ErrorType for FlashController<R> {
    type Error = Error;
}

impl<R: FlashRegisters> ReadNorFlash for FlashController<R> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Error> {
        FlashController::read(self, offset, bytes).map(|_| ())
    }

    fn capacity(&self) -> usize {
        self.chip_size() as usize
    }
}

impl<R: FlashRegisters> NorFlash for FlashController<R> {
    const WRITE_SIZE: usize = DOUBLE_WORD as usize;
    const ERASE_SIZE: usize = PAGE_SIZE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Error> {
        if from > to || from % PAGE_SIZE != 0 || to % PAGE_SIZE != 0 {
            return Err(Error::InvalidArgument);
        }
        FlashController::erase(self, from, (to - from) / PAGE_SIZE)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(Error::InvalidArgument);
        }
        FlashController::write(self, offset, bytes).map(|_| ())
    }
}
