//! Voice factories and key-range dispatch.

use std::sync::Arc;

use legato_core::SharedSource;

use crate::error::Result;
use crate::key::{shared_key, GenericMidiKey, SharedKey, SilenceMidiKey, VoiceParams};

/// Builds voices for note-on events.
pub trait MidiInstrument: Send + Sync {
    /// Instrument name.
    fn name(&self) -> &str;

    /// Build a fresh voice for `key`.
    ///
    /// Fails when the instrument's prototype source cannot be duplicated.
    fn generate(&self, key: i32, start_velocity: i32, pitch_bend_semitones: f64)
        -> Result<SharedKey>;

    /// True if a voice started at `key` can slide to a new pitch.
    fn supports_slide(&self, key: i32) -> bool;
}

/// An instrument defined by a prototype source and one set of voice
/// parameters; every voice plays a fresh duplicate of the prototype.
pub struct GenericMidiInstrument {
    name: String,
    source: SharedSource,
    params: VoiceParams,
}

impl GenericMidiInstrument {
    pub fn new(name: impl Into<String>, source: SharedSource, params: VoiceParams) -> Self {
        Self {
            name: name.into(),
            source,
            params,
        }
    }
}

impl MidiInstrument for GenericMidiInstrument {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(
        &self,
        key: i32,
        start_velocity: i32,
        pitch_bend_semitones: f64,
    ) -> Result<SharedKey> {
        let source = self.source.lock().duplicate()?;
        Ok(shared_key(GenericMidiKey::new(
            key,
            start_velocity,
            pitch_bend_semitones,
            source,
            self.params,
        )))
    }

    fn supports_slide(&self, _key: i32) -> bool {
        self.params.slide_speed > 0.0
    }
}

/// A sub-instrument covering an inclusive key range.
pub struct KeyRange {
    pub instrument: Arc<dyn MidiInstrument>,
    pub start_key: i32,
    pub end_key: i32,
}

impl KeyRange {
    pub fn new(instrument: Arc<dyn MidiInstrument>, start_key: i32, end_key: i32) -> Self {
        Self {
            instrument,
            start_key,
            end_key,
        }
    }

    /// Distance from `key` to this range; zero inside it.
    fn distance(&self, key: i32) -> i32 {
        if key < self.start_key {
            self.start_key - key
        } else if key > self.end_key {
            key - self.end_key
        } else {
            0
        }
    }
}

/// Dispatches each key to the closest of its registered ranges.
///
/// A key inside a range uses that range's instrument; otherwise the range
/// with the smallest distance wins, earlier insertions breaking ties. With no
/// ranges at all, every note is silent.
pub struct SelectMidiInstrument {
    name: String,
    ranges: Vec<KeyRange>,
}

impl SelectMidiInstrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ranges: Vec::new(),
        }
    }

    /// Register `range`. Empty ranges (start past end) are dropped.
    pub fn add_range(&mut self, range: KeyRange) {
        if range.start_key <= range.end_key {
            self.ranges.push(range);
        }
    }

    fn instrument_for(&self, key: i32) -> Option<&Arc<dyn MidiInstrument>> {
        let mut best: Option<(i32, &KeyRange)> = None;
        for range in &self.ranges {
            let distance = range.distance(key);
            if distance == 0 {
                return Some(&range.instrument);
            }
            if best.map_or(true, |(best_distance, _)| distance < best_distance) {
                best = Some((distance, range));
            }
        }
        best.map(|(_, range)| &range.instrument)
    }
}

impl MidiInstrument for SelectMidiInstrument {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(
        &self,
        key: i32,
        start_velocity: i32,
        pitch_bend_semitones: f64,
    ) -> Result<SharedKey> {
        match self.instrument_for(key) {
            Some(instrument) => instrument.generate(key, start_velocity, pitch_bend_semitones),
            None => Ok(shared_key(SilenceMidiKey::new())),
        }
    }

    fn supports_slide(&self, key: i32) -> bool {
        match self.instrument_for(key) {
            Some(instrument) => instrument.supports_slide(key),
            None => true,
        }
    }
}
