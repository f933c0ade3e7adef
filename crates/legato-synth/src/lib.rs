//! # legato-synth - the MIDI voice layer
//!
//! Turns note events into audio-graph voices:
//!
//! - [`note`] - MIDI constants and key/frequency math
//! - [`key`] - the per-voice ADSR state machine
//! - [`instrument`] - voice factories and key-range dispatch
//! - [`provider`] - program-number lookup
//! - [`channel`] - the note multiplexer that owns a channel's voice bus
//! - [`library`] - instrument directory loading (feature `files`)

pub mod channel;
pub mod error;
pub mod instrument;
pub mod key;
#[cfg(feature = "files")]
pub mod library;
pub mod note;
pub mod provider;

pub use channel::MidiChannel;
pub use error::{Error, Result};
pub use instrument::{GenericMidiInstrument, KeyRange, MidiInstrument, SelectMidiInstrument};
pub use key::{
    key_source, shared_key, GenericMidiKey, MidiKey, SharedKey, SilenceMidiKey, VoiceParams,
    VoiceStage,
};
#[cfg(feature = "files")]
pub use library::load_directory;
pub use note::{
    frequency_key, is_valid_key, key_frequency, relative_frequency, DEFAULT_VELOCITY, INVALID_KEY,
    MAX_KEY, MAX_VELOCITY, MIDDLE_C, PITCH_BEND_SPEED,
};
pub use provider::{GenericInstrumentProvider, InstrumentProvider};
