//! Host tool errors

use std::path::PathBuf;

/// Errors reported by the command-line tool
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("flash controller: {0}")]
    Flash(#[from] g4flash_core::Error),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image is {len} bytes but the flash holds {capacity} bytes")]
    ImageTooLarge { len: usize, capacity: u32 },

    #[error("{0}")]
    Usage(String),

    #[error("verification failed at offset {0:#010x}")]
    Verify(u32),
}

impl CliError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
