//! Read command

use std::fs;
use std::path::Path;

use g4flash_core::{FlashController, FlashRegisters};

use super::{print_flash_size, progress_bar, CHUNK_SIZE};
use crate::error::{CliError, Result};

pub fn run<R: FlashRegisters>(
    flash: &mut FlashController<R>,
    output: &Path,
    offset: u32,
    length: Option<u32>,
) -> Result<()> {
    flash.init()?;
    let geometry = flash.geometry();
    print_flash_size(geometry.chip_size);

    let available = geometry.chip_size.checked_sub(offset).ok_or_else(|| {
        CliError::Usage(format!("offset {:#x} is past the end of flash", offset))
    })?;
    let length = length.unwrap_or(available);
    if length > available {
        return Err(CliError::Usage(format!(
            "{} bytes at {:#x} exceed the {} KiB flash",
            length,
            offset,
            geometry.chip_size / 1024
        )));
    }

    let data = read_range(flash, offset, length as usize)?;
    fs::write(output, &data).map_err(|e| CliError::io(output, e))?;
    println!("Wrote {} bytes to {}", data.len(), output.display());
    Ok(())
}

fn read_range<R: FlashRegisters>(
    flash: &mut FlashController<R>,
    offset: u32,
    length: usize,
) -> Result<Vec<u8>> {
    let mut data = vec![0u8; length];
    let pb = progress_bar(length as u64, "Reading");

    let mut done = 0usize;
    for chunk in data.chunks_mut(CHUNK_SIZE) {
        if let Err(e) = flash.read(offset + done as u32, chunk) {
            pb.abandon_with_message("Read failed");
            return Err(e.into());
        }
        done += chunk.len();
        pb.set_position(done as u64);
    }
    pb.finish_with_message("Read complete");
    Ok(data)
}
