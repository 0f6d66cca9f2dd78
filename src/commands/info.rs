//! Info command

use g4flash_core::{FlashController, FlashRegisters, Status};

use crate::error::Result;

pub fn run<R: FlashRegisters>(flash: &mut FlashController<R>) -> Result<()> {
    flash.init()?;
    let geometry = flash.geometry();
    let config = *flash.config();
    let locked = flash.is_locked();
    let status = flash.status();

    println!("Flash Controller Information");
    println!("============================");
    println!();
    println!(
        "Size:            {} bytes ({} KiB)",
        geometry.chip_size,
        geometry.chip_size / 1024
    );
    println!("Page size:       {} bytes", geometry.page_size);
    println!("Pages:           {}", geometry.page_count());
    println!("Write unit:      8 bytes (double-word)");
    println!();
    println!("Control:         {}", if locked { "Locked" } else { "Unlocked" });
    println!(
        "Busy:            {}",
        if status.contains(Status::BSY) { "Yes" } else { "No" }
    );
    let errors = status & Status::ERRORS;
    if errors.is_empty() {
        println!("Error flags:     None");
    } else {
        println!("Error flags:     {:?}", errors);
    }
    println!();
    println!("Erase timeout:   {} polls", config.erase_timeout);
    println!("Program timeout: {} polls", config.program_timeout);
    Ok(())
}
