//! # legato-core - compositional audio-source graph
//!
//! The kernel of the legato synthesizer: a pull-model graph of audio sources
//! that produce per-channel samples on demand and advance in simulated time.
//!
//! ## Architecture
//!
//! - [`source`] - the [`AudioSource`] trait and the concrete nodes
//!   (oscillators, sampled playback, rate/gain controllers, combiners, the
//!   event dispatcher)
//! - [`audio_data`] - immutable decoded PCM with a loop descriptor
//! - [`channels`] - the internal channel array and the 1..=6 up/down-mix table
//! - [`output`] - the device output bridge pulling frames under the host
//!   audio callback
//!
//! The graph is a DAG of reference-counted nodes: a child may be shared
//! between composites, and the whole graph is mutated by the controlling
//! thread under the output bridge lock while the audio callback renders.

pub mod audio_data;
pub mod channels;
#[cfg(feature = "files")]
mod decode;
pub mod error;
pub mod output;
pub mod ramp;
pub mod source;

pub use audio_data::AudioData;
pub use channels::{mix_frame, Frame, CHANNELS};
pub use error::{Error, Result};
pub use output::AudioOutput;
pub use ramp::Ramp;
pub use source::{
    shared, Amplify, AudioSource, EventDispatcher, EventFn, Mix, Modulate, NodeId, Pan, Sampled,
    Scheduler, SharedSource, Silence, Sine, SlotId, TimeScale, Triangle,
};
