//! Error types for g4flash-core
//!
//! The driver runs where there is no unwinding, so every failure is a value.
//! Two kinds are enough to describe what can go wrong.

use core::fmt;
use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A precondition was violated: the address is unaligned or out of
    /// range, the controller is busy, or it is locked.
    ///
    /// Returned before any register is written.
    InvalidArgument,
    /// The busy flag did not clear within the operation's poll budget
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::Timeout => write!(f, "flash operation timed out"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl NorFlashError for Error {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Self::InvalidArgument => NorFlashErrorKind::OutOfBounds,
            Self::Timeout => NorFlashErrorKind::Other,
        }
    }
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
