//! Controller configuration
//!
//! The page size is fixed when the crate is built; poll budgets can be
//! changed at runtime. Budgets are raw iteration counts of the busy-flag
//! spin, not time units.

use crate::error::{Error, Result};

/// Flash page size in bytes
#[cfg(not(feature = "page-4k"))]
pub const PAGE_SIZE: u32 = 2048;
/// Flash page size in bytes
#[cfg(feature = "page-4k")]
pub const PAGE_SIZE: u32 = 4096;

/// Busy-flag polls allowed per page erase
pub const ERASE_TIMEOUT: u32 = 0x000B_0000;
/// Busy-flag polls allowed per double-word program
pub const PROGRAM_TIMEOUT: u32 = 0x0000_2000;

/// Runtime options for a [`FlashController`](crate::FlashController)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashConfig {
    /// Busy-flag polls allowed per page erase
    pub erase_timeout: u32,
    /// Busy-flag polls allowed per double-word program
    pub program_timeout: u32,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            erase_timeout: ERASE_TIMEOUT,
            program_timeout: PROGRAM_TIMEOUT,
        }
    }
}

impl FlashConfig {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the erase poll budget
    pub fn with_erase_timeout(mut self, polls: u32) -> Self {
        self.erase_timeout = polls;
        self
    }

    /// Set the program poll budget
    pub fn with_program_timeout(mut self, polls: u32) -> Self {
        self.program_timeout = polls;
        self
    }

    /// Parse options from key-value pairs (from CLI)
    ///
    /// Supported options:
    /// - erase_timeout=<polls>
    /// - program_timeout=<polls>
    ///
    /// Values may be decimal or `0x`-prefixed hex. A zero budget is
    /// rejected since every operation would time out.
    pub fn from_options(options: &[(&str, &str)]) -> Result<Self> {
        let mut cfg = Self::default();

        for (key, value) in options {
            match *key {
                "erase_timeout" => cfg.erase_timeout = parse_budget(value)?,
                "program_timeout" => cfg.program_timeout = parse_budget(value)?,
                _ => {
                    log::warn!("Unknown flash option: {}={}", key, value);
                }
            }
        }

        Ok(cfg)
    }
}

fn parse_budget(value: &str) -> Result<u32> {
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        value.parse::<u32>()
    };

    match parsed {
        Ok(0) | Err(_) => Err(Error::InvalidArgument),
        Ok(polls) => Ok(polls),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = FlashConfig::default();
        assert_eq!(cfg.erase_timeout, 0xB0000);
        assert_eq!(cfg.program_timeout, 0x2000);
        assert!(cfg.program_timeout < cfg.erase_timeout);
    }

    #[cfg(not(feature = "page-4k"))]
    #[test]
    fn test_default_page_size() {
        assert_eq!(PAGE_SIZE, 2048);
    }

    #[test]
    fn test_builders() {
        let cfg = FlashConfig::new()
            .with_erase_timeout(10)
            .with_program_timeout(3);
        assert_eq!(cfg.erase_timeout, 10);
        assert_eq!(cfg.program_timeout, 3);
    }

    #[test]
    fn test_from_options() {
        let cfg =
            FlashConfig::from_options(&[("erase_timeout", "0x100"), ("program_timeout", "42")])
                .unwrap();
        assert_eq!(cfg.erase_timeout, 0x100);
        assert_eq!(cfg.program_timeout, 42);
    }

    #[test]
    fn test_from_options_ignores_unknown_keys() {
        let cfg = FlashConfig::from_options(&[("latency", "2")]).unwrap();
        assert_eq!(cfg, FlashConfig::default());
    }

    #[test]
    fn test_from_options_rejects_bad_values() {
        assert_eq!(
            FlashConfig::from_options(&[("erase_timeout", "soon")]),
            Err(Error::InvalidArgument)
        );
        assert_eq!(
            FlashConfig::from_options(&[("program_timeout", "0")]),
            Err(Error::InvalidArgument)
        );
    }
}
