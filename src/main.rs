//! g4flash - STM32G4 on-chip flash tool
//!
//! Drives the `g4flash-core` controller on the host. There is no FLASH
//! peripheral here, so commands run against the simulated part from
//! `g4flash-sim`, optionally backed by an image file that persists the
//! array contents between runs.

mod cli;
mod commands;
mod error;
mod image;

use clap::Parser;
use cli::{Cli, Commands};
use commands::erase::EraseRange;
use g4flash_core::{FlashConfig, FlashController};

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> error::Result<()> {
    let config = FlashConfig::from_options(&cli.option_pairs())?;
    let image_path = cli.image.as_deref();
    let sim = image::load(image_path, cli.size_kb)?;
    let mut flash = FlashController::with_config(sim, config);

    let modified = match cli.command {
        Commands::Info => {
            commands::info::run(&mut flash)?;
            false
        }
        Commands::Erase { start, pages, all } => {
            let range = match (start, all) {
                (_, true) => EraseRange::All,
                (Some(start), false) => EraseRange::Pages {
                    start,
                    pages: pages.unwrap_or(1),
                },
                (None, false) => {
                    return Err(error::CliError::Usage(
                        "erase needs --start or --all".to_string(),
                    ))
                }
            };
            commands::erase::run(&mut flash, range)?;
            true
        }
        Commands::Write {
            input,
            offset,
            no_verify,
            no_erase,
        } => {
            commands::write::run(&mut flash, &input, offset, !no_erase, !no_verify)?;
            true
        }
        Commands::Read {
            output,
            offset,
            length,
        } => {
            commands::read::run(&mut flash, &output, offset, length)?;
            false
        }
    };

    if modified {
        image::save(image_path, flash.registers())?;
    }
    Ok(())
}
