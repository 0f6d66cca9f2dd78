//! Command implementations
//!
//! Each command drives a [`FlashController`](g4flash_core::FlashController)
//! over any [`FlashRegisters`](g4flash_core::FlashRegisters) backend; the
//! binary happens to pass the simulated part.

pub mod erase;
pub mod info;
pub mod read;
pub mod write;

use indicatif::{ProgressBar, ProgressStyle};

/// Bytes handled between progress updates
const CHUNK_SIZE: usize = 4096;

/// Byte progress bar labelled with the current phase
fn progress_bar(total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} {} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{eta}})",
            phase
        ))
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Page-count progress bar for erases
fn page_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} Erasing [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Print flash size information
fn print_flash_size(flash_size: u32) {
    println!(
        "Flash size: {} bytes ({} KiB)",
        flash_size,
        flash_size / 1024
    );
}

#[cfg(test)]
mod tests {
    use super::erase::{self, EraseRange};
    use super::{read, write};
    use crate::error::CliError;
    use g4flash_core::{FlashController, PAGE_SIZE};
    use g4flash_sim::{BusyMode, SimConfig, SimFlash};
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("g4flash-cmd-{}-{}", std::process::id(), name))
    }

    fn flash(initial: &[u8]) -> FlashController<SimFlash> {
        let config = SimConfig {
            size_kib: 16,
            busy: BusyMode::Polls(1),
        };
        FlashController::new(SimFlash::with_data(config, initial))
    }

    #[test]
    fn test_write_erases_programs_and_verifies() {
        let input = temp_path("write-in.bin");
        let payload: Vec<u8> = (0..100u8).collect();
        fs::write(&input, &payload).unwrap();

        let mut flash = flash(&[0x00; 16 * 1024]);
        write::run(&mut flash, &input, PAGE_SIZE, true, true).unwrap();

        let data = flash.registers().data();
        let page = PAGE_SIZE as usize;
        assert_eq!(&data[page..page + 100], &payload[..]);
        // Padding of the final double-word
        assert_eq!(&data[page + 100..page + 104], &[0xFF; 4]);
        // Neighbouring pages untouched
        assert_eq!(data[page - 1], 0x00);
        assert_eq!(data[2 * page], 0x00);
        assert!(flash.is_locked());
        fs::remove_file(&input).unwrap();
    }

    #[test]
    fn test_write_without_erase_fails_verify() {
        let input = temp_path("write-noerase.bin");
        fs::write(&input, [0xA5u8; 8]).unwrap();

        let mut flash = flash(&[0x5A; 8]);
        let err = write::run(&mut flash, &input, 0, false, true).unwrap_err();
        assert!(matches!(err, CliError::Verify(0)));
        fs::remove_file(&input).unwrap();
    }

    #[test]
    fn test_write_rejects_unaligned_offset() {
        let input = temp_path("write-unaligned.bin");
        fs::write(&input, [0u8; 8]).unwrap();

        let mut flash = flash(&[]);
        let err = write::run(&mut flash, &input, 4, true, true).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
        fs::remove_file(&input).unwrap();
    }

    #[test]
    fn test_write_past_end_rejected() {
        let input = temp_path("write-large.bin");
        fs::write(&input, [0u8; 16]).unwrap();

        let mut flash = flash(&[]);
        let err = write::run(&mut flash, &input, 16 * 1024 - 8, true, true).unwrap_err();
        assert!(matches!(
            err,
            CliError::ImageTooLarge {
                len: 16,
                capacity: 8
            }
        ));
        fs::remove_file(&input).unwrap();
    }

    #[test]
    fn test_erase_all() {
        let mut flash = flash(&[0x00; 16 * 1024]);
        erase::run(&mut flash, EraseRange::All).unwrap();
        assert!(flash.registers().data().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_erase_range_floors_start() {
        let mut flash = flash(&[0x00; 16 * 1024]);
        erase::run(
            &mut flash,
            EraseRange::Pages {
                start: PAGE_SIZE + 10,
                pages: 1,
            },
        )
        .unwrap();

        let data = flash.registers().data();
        let page = PAGE_SIZE as usize;
        assert!(data[page..2 * page].iter().all(|&b| b == 0xFF));
        assert_eq!(data[page - 1], 0x00);
        assert_eq!(data[2 * page], 0x00);
    }

    #[test]
    fn test_erase_range_out_of_bounds() {
        let mut flash = flash(&[]);
        let pages = 16 * 1024 / PAGE_SIZE;
        let range = EraseRange::Pages {
            start: PAGE_SIZE,
            pages,
        };
        let err = erase::run(&mut flash, range).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
    }

    #[test]
    fn test_read_to_file() {
        let output = temp_path("read-out.bin");
        let initial: Vec<u8> = (0..=255u8).collect();

        let mut flash = flash(&initial);
        read::run(&mut flash, &output, 16, Some(32)).unwrap();
        assert_eq!(fs::read(&output).unwrap(), &initial[16..48]);

        read::run(&mut flash, &output, 16 * 1024 - 4, None).unwrap();
        assert_eq!(fs::read(&output).unwrap(), vec![0xFF; 4]);
        fs::remove_file(&output).unwrap();
    }

    #[test]
    fn test_read_past_end() {
        let output = temp_path("read-past.bin");
        let mut flash = flash(&[]);
        let err = read::run(&mut flash, &output, 16 * 1024 + 1, None).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));

        let err = read::run(&mut flash, &output, 0, Some(16 * 1024 + 1)).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));

        // Rejected before the buffer is sized
        let err = read::run(&mut flash, &output, 8, Some(u32::MAX)).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
        assert!(!output.exists());
    }
}
