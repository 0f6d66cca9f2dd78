//! Write command

use std::fs;
use std::path::Path;

use g4flash_core::geometry::DOUBLE_WORD;
use g4flash_core::{FlashController, FlashRegisters};

use super::{erase::erase_pages, print_flash_size, progress_bar, CHUNK_SIZE};
use crate::error::{CliError, Result};

pub fn run<R: FlashRegisters>(
    flash: &mut FlashController<R>,
    input: &Path,
    offset: u32,
    erase: bool,
    verify: bool,
) -> Result<()> {
    let data = fs::read(input).map_err(|e| CliError::io(input, e))?;
    println!("Read {} bytes from {}", data.len(), input.display());

    if offset % DOUBLE_WORD != 0 {
        return Err(CliError::Usage(format!(
            "offset {:#x} is not {}-byte aligned",
            offset, DOUBLE_WORD
        )));
    }

    flash.init()?;
    let geometry = flash.geometry();
    print_flash_size(geometry.chip_size);

    if data.is_empty() {
        println!("Nothing to write");
        return Ok(());
    }
    if !geometry.contains(offset, data.len()) {
        return Err(CliError::ImageTooLarge {
            len: data.len(),
            capacity: geometry.chip_size.saturating_sub(offset),
        });
    }

    if erase {
        let first = geometry.page_floor(offset);
        let last = geometry.page_floor(offset + (data.len() as u32 - 1));
        erase_pages(flash, first, (last - first) / geometry.page_size + 1)?;
    }

    program(flash, offset, &data)?;

    if verify {
        verify_contents(flash, offset, &data)?;
    }
    println!("Wrote {} bytes at {:#x}", data.len(), offset);
    Ok(())
}

fn program<R: FlashRegisters>(
    flash: &mut FlashController<R>,
    offset: u32,
    data: &[u8],
) -> Result<()> {
    let mut flash = flash.unlocked()?;
    let pb = progress_bar(data.len() as u64, "Writing");

    let mut done = 0usize;
    for chunk in data.chunks(CHUNK_SIZE) {
        if let Err(e) = flash.write(offset + done as u32, chunk) {
            pb.abandon_with_message("Write failed");
            return Err(e.into());
        }
        done += chunk.len();
        pb.set_position(done as u64);
    }
    pb.finish_with_message("Write complete");
    Ok(())
}

fn verify_contents<R: FlashRegisters>(
    flash: &mut FlashController<R>,
    offset: u32,
    expected: &[u8],
) -> Result<()> {
    let pb = progress_bar(expected.len() as u64, "Verifying");
    let mut buf = vec![0u8; CHUNK_SIZE];

    let mut done = 0usize;
    for expected_chunk in expected.chunks(CHUNK_SIZE) {
        let chunk = &mut buf[..expected_chunk.len()];
        flash.read(offset + done as u32, chunk)?;

        if let Some(pos) = chunk.iter().zip(expected_chunk).position(|(a, b)| a != b) {
            pb.abandon_with_message("Verification failed!");
            return Err(CliError::Verify(offset + (done + pos) as u32));
        }
        done += chunk.len();
        pb.set_position(done as u64);
    }
    pb.finish_with_message("Verification passed");
    Ok(())
}
