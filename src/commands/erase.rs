//! Erase command

use g4flash_core::{FlashController, FlashRegisters};

use super::page_bar;
use crate::error::{CliError, Result};

/// Pages to erase, as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseRange {
    /// Every page of the part
    All,
    /// `pages` pages starting with the one holding `start`
    Pages { start: u32, pages: u32 },
}

pub fn run<R: FlashRegisters>(flash: &mut FlashController<R>, range: EraseRange) -> Result<()> {
    flash.init()?;
    let geometry = flash.geometry();

    let (first, pages) = match range {
        EraseRange::All => (0, geometry.page_count()),
        EraseRange::Pages { start, pages } => (geometry.page_floor(start), pages),
    };
    if !geometry.contains_pages(first, pages) {
        return Err(CliError::Usage(format!(
            "{} page(s) at {:#x} exceed the {} KiB flash",
            pages,
            first,
            geometry.chip_size / 1024
        )));
    }

    erase_pages(flash, first, pages)?;
    println!(
        "Erased {} page(s) at {:#x} ({} bytes)",
        pages,
        first,
        pages * geometry.page_size
    );
    Ok(())
}

/// Erase `pages` pages from the page-aligned `first`, one at a time
pub(crate) fn erase_pages<R: FlashRegisters>(
    flash: &mut FlashController<R>,
    first: u32,
    pages: u32,
) -> Result<()> {
    let page_size = flash.page_size();
    let mut flash = flash.unlocked()?;

    let pb = page_bar(u64::from(pages));
    for n in 0..pages {
        let addr = first + n * page_size;
        log::trace!("Erasing page at {:#x}", addr);
        if let Err(e) = flash.erase(addr, 1) {
            pb.abandon_with_message("Erase failed");
            return Err(e.into());
        }
        pb.inc(1);
    }
    pb.finish_with_message("Erase complete");
    Ok(())
}
