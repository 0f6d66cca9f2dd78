//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a `key=value` controller option
fn parse_option(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("Expected key=value, got '{}'", s))
}

#[derive(Parser)]
#[command(name = "g4flash")]
#[command(author, version, about = "STM32G4 on-chip flash tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Flash image backing the simulated part (created if missing)
    #[arg(long, global = true)]
    pub image: Option<PathBuf>,

    /// Capacity reported by the simulated part's size fuse, in KiB
    #[arg(long, global = true, default_value = "128", value_parser = parse_hex_u32)]
    pub size_kb: u32,

    /// Controller options (erase_timeout=<polls>, program_timeout=<polls>)
    #[arg(short = 'o', long = "option", global = true, value_parser = parse_option)]
    pub options: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Controller options as borrowed key-value pairs
    pub fn option_pairs(&self) -> Vec<(&str, &str)> {
        self.options
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show flash geometry and controller state
    Info,

    /// Erase flash pages
    Erase {
        /// Address inside the first page to erase (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_hex_u32, conflicts_with = "all")]
        start: Option<u32>,

        /// Number of pages to erase
        #[arg(long, value_parser = parse_hex_u32, requires = "start")]
        pages: Option<u32>,

        /// Erase every page
        #[arg(long)]
        all: bool,
    },

    /// Write file to flash
    Write {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Destination offset, double-word aligned (hex or decimal)
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        offset: u32,

        /// Skip reading back and comparing after writing
        #[arg(long)]
        no_verify: bool,

        /// Don't erase the covered pages before writing
        #[arg(long)]
        no_erase: bool,
    },

    /// Read flash contents to file
    Read {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start offset (hex or decimal)
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        offset: u32,

        /// Bytes to read (defaults to the rest of the flash)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x800"), Ok(0x800));
        assert_eq!(parse_hex_u32("2048"), Ok(2048));
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_parse_option() {
        assert_eq!(
            parse_option("erase_timeout = 0x10"),
            Ok(("erase_timeout".to_string(), "0x10".to_string()))
        );
        assert!(parse_option("erase_timeout").is_err());
    }

    #[test]
    fn test_parse_write() {
        let cli = Cli::parse_from([
            "g4flash", "-v", "--image", "fw.bin", "-o", "program_timeout=64", "write", "-i",
            "app.bin", "--offset", "0x800",
        ]);
        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.option_pairs(), vec![("program_timeout", "64")]);
        match cli.command {
            Commands::Write {
                offset, no_erase, ..
            } => {
                assert_eq!(offset, 0x800);
                assert!(!no_erase);
            }
            _ => panic!("expected write"),
        }
    }
}
