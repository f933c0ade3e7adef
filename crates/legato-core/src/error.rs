//! Error types for legato-core.

use thiserror::Error;

/// Error type for legato-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A second device output was opened while another one is live.
    #[error("device audio output already in use")]
    DeviceBusy,

    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("audio device configuration failed")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported device sample format: {0}")]
    UnsupportedFormat(String),

    #[cfg(feature = "files")]
    #[error("failed to decode audio file: {path}")]
    Decode {
        path: std::path::PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },

    /// `duplicate` was called on a node that cannot be deep-copied
    /// (the event dispatcher and live MIDI voices).
    #[error("source is not duplicable")]
    NotDuplicable,

    /// Inserting the child would make the source graph cyclic.
    #[error("insertion would create a cycle in the source graph")]
    Cycle,
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
