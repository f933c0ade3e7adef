//! # legato - real-time compositional software synthesizer
//!
//! A pull-model audio engine: a recursively composable graph of sources
//! renders per-channel samples on demand into the host device callback, and
//! a MIDI voice layer multiplexes note events into that graph.
//!
//! ## Architecture
//!
//! - **legato-core** - the audio-source graph (oscillators, sampled
//!   playback, rate and gain ramps, mixing, event dispatch), channel
//!   up/down-mixing, and the CPAL output bridge
//! - **legato-synth** - the MIDI layer: per-voice ADSR keys, instruments
//!   with key-range dispatch, the channel note multiplexer, and instrument
//!   directory loading
//!
//! ## Quick start
//!
//! ```ignore
//! use legato::prelude::*;
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//!
//! let instrument = Arc::new(GenericMidiInstrument::new(
//!     "sine lead",
//!     shared(Sine::new(440.0, 1.0)),
//!     params,
//! ));
//! let channel = Arc::new(Mutex::new(MidiChannel::new(instrument)));
//! let root: SharedSource = Arc::clone(&channel);
//!
//! let output = AudioOutput::new()?;
//! output.bind(root);
//! {
//!     let _graph = output.lock();
//!     channel.lock().note_on(60, DEFAULT_VELOCITY)?;
//! }
//! ```
//!
//! ## Feature flags
//!
//! - `files` - audio file decoding and instrument directory loading

/// Re-export of legato-core for direct access.
pub use legato_core as core;
/// Re-export of legato-synth for direct access.
pub use legato_synth as synth;

pub use legato_core::{
    mix_frame, shared, Amplify, AudioData, AudioOutput, AudioSource, EventDispatcher, EventFn,
    Frame, Mix, Modulate, NodeId, Pan, Ramp, Sampled, Scheduler, SharedSource, Silence, Sine,
    SlotId, TimeScale, Triangle, CHANNELS,
};

pub use legato_synth::{
    frequency_key, is_valid_key, key_frequency, key_source, relative_frequency, shared_key,
    GenericInstrumentProvider, GenericMidiInstrument, GenericMidiKey, InstrumentProvider, KeyRange,
    MidiChannel, MidiInstrument, MidiKey, SelectMidiInstrument, SharedKey, SilenceMidiKey,
    VoiceParams, VoiceStage, DEFAULT_VELOCITY, INVALID_KEY, MAX_KEY, MAX_VELOCITY, MIDDLE_C,
    PITCH_BEND_SPEED,
};

#[cfg(feature = "files")]
pub use legato_synth::load_directory;

/// The commonly used surface in one import.
pub mod prelude {
    pub use legato_core::{
        mix_frame, shared, Amplify, AudioData, AudioOutput, AudioSource, EventDispatcher, EventFn,
        Frame, Mix, Modulate, Pan, Ramp, Sampled, Scheduler, SharedSource, Silence, Sine,
        TimeScale, Triangle, CHANNELS,
    };
    pub use legato_synth::{
        key_frequency, relative_frequency, shared_key, GenericMidiInstrument, GenericMidiKey,
        MidiChannel, MidiInstrument, MidiKey, SelectMidiInstrument, SharedKey, VoiceParams,
        DEFAULT_VELOCITY, MAX_KEY, MIDDLE_C,
    };

    #[cfg(feature = "files")]
    pub use legato_synth::load_directory;
}
