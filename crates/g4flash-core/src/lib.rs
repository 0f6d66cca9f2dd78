//! g4flash-core - Driver for the STM32G4 on-chip flash controller
//!
//! This crate erases, programs and reads the single-bank, page-erasable
//! flash of STM32G4 parts through the memory-mapped FLASH register block.
//! It is `no_std` and performs no allocation.
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for [`Error`]
//! - `page-4k` - Use 4 KiB pages instead of the default 2 KiB
//!
//! # Example
//!
//! ```ignore
//! use g4flash_core::{FlashController, Mmio};
//!
//! // SAFETY: the FLASH peripheral is not used anywhere else.
//! let mut flash = FlashController::new(unsafe { Mmio::new() });
//!
//! flash.unlock()?;
//! flash.erase(0x1_F800, 1)?;
//! flash.write(0x1_F800, &[0xA5; 16])?;
//! flash.lock()?;
//!
//! let mut buf = [0u8; 16];
//! flash.read(0x1_F800, &mut buf)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod hal;
pub mod regs;
mod storage;

pub use config::{FlashConfig, ERASE_TIMEOUT, PAGE_SIZE, PROGRAM_TIMEOUT};
pub use controller::{FlashController, Unlocked};
pub use error::{Error, Result};
pub use geometry::DeviceGeometry;
pub use hal::{FlashRegisters, Mmio};
pub use regs::{Control, Register, Status};
