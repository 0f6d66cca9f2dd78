//! Flash image files backing the simulated part
//!
//! The host has no FLASH peripheral, so every command runs the controller
//! against [`SimFlash`]. With `--image` the array contents are loaded from
//! a file before the command and written back after a modifying one.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use g4flash_sim::{BusyMode, SimConfig, SimFlash};

use crate::error::{CliError, Result};

/// Build the simulated part, filling it from `path` when the file exists
pub fn load(path: Option<&Path>, size_kib: u32) -> Result<SimFlash> {
    let size_kib = u16::try_from(size_kib)
        .ok()
        .filter(|&kib| kib != 0)
        .ok_or_else(|| CliError::Usage(format!("invalid flash size: {} KiB", size_kib)))?;
    let config = SimConfig {
        size_kib,
        busy: BusyMode::Polls(1),
    };
    let capacity = u32::from(size_kib) * 1024;

    let Some(path) = path else {
        log::debug!("No image given, starting from an erased part");
        return Ok(SimFlash::new(config));
    };

    match fs::read(path) {
        Ok(data) => {
            if data.len() > capacity as usize {
                return Err(CliError::ImageTooLarge {
                    len: data.len(),
                    capacity,
                });
            }
            log::debug!("Loaded {} bytes from {}", data.len(), path.display());
            Ok(SimFlash::with_data(config, &data))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("{} not found, starting from an erased part", path.display());
            Ok(SimFlash::new(config))
        }
        Err(e) => Err(CliError::io(path, e)),
    }
}

/// Write the array contents back to `path`
pub fn save(path: Option<&Path>, sim: &SimFlash) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    fs::write(path, sim.data()).map_err(|e| CliError::io(path, e))?;
    log::debug!("Saved {} bytes to {}", sim.data().len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("g4flash-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_missing_image_is_erased() {
        let path = temp_path("missing.bin");
        let sim = load(Some(&path), 4).unwrap();
        assert_eq!(sim.data().len(), 4096);
        assert!(sim.data().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_round_trip_through_file() {
        let path = temp_path("roundtrip.bin");
        let mut sim = load(None, 4).unwrap();
        sim.data_mut()[..4].copy_from_slice(&[1, 2, 3, 4]);
        save(Some(&path), &sim).unwrap();

        let loaded = load(Some(&path), 4).unwrap();
        assert_eq!(&loaded.data()[..4], &[1, 2, 3, 4]);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_oversized_image_rejected() {
        let path = temp_path("oversized.bin");
        fs::write(&path, vec![0u8; 2048 + 1]).unwrap();
        let result = load(Some(&path), 2);
        assert!(matches!(
            result,
            Err(CliError::ImageTooLarge {
                len: 2049,
                capacity: 2048
            })
        ));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_invalid_size() {
        assert!(matches!(load(None, 0), Err(CliError::Usage(_))));
        assert!(matches!(load(None, 0x1_0000), Err(CliError::Usage(_))));
    }
}
