//! Error types for legato-synth.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for legato-synth operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An instrument config file violated the directory format.
    #[error("invalid instrument config: {path}:{line}")]
    ConfigParse { path: PathBuf, line: usize },

    #[error("failed to read instrument data")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] legato_core::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
