//! Program-number lookup for instruments.

use std::collections::HashMap;
use std::sync::Arc;

use crate::instrument::{MidiInstrument, SelectMidiInstrument};

/// Maps MIDI program numbers to instruments.
pub trait InstrumentProvider: Send + Sync {
    fn instrument(&self, program: i32) -> Arc<dyn MidiInstrument>;
}

/// A plain registry with a silent fallback for unknown programs.
pub struct GenericInstrumentProvider {
    instruments: HashMap<i32, Arc<dyn MidiInstrument>>,
    silent: Arc<dyn MidiInstrument>,
}

impl GenericInstrumentProvider {
    pub fn new() -> Self {
        Self {
            instruments: HashMap::new(),
            silent: Arc::new(SelectMidiInstrument::new("")),
        }
    }

    pub fn insert(&mut self, program: i32, instrument: Arc<dyn MidiInstrument>) {
        self.instruments.insert(program, instrument);
    }
}

impl Default for GenericInstrumentProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentProvider for GenericInstrumentProvider {
    fn instrument(&self, program: i32) -> Arc<dyn MidiInstrument> {
        match self.instruments.get(&program) {
            Some(instrument) => Arc::clone(instrument),
            None => Arc::clone(&self.silent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::DEFAULT_VELOCITY;
    use legato_core::AudioSource;

    #[test]
    fn test_unknown_programs_fall_back_to_silence() {
        let provider = GenericInstrumentProvider::new();
        let instrument = provider.instrument(42);
        let key = instrument.generate(60, DEFAULT_VELOCITY, 0.0).unwrap();
        assert_eq!(key.lock().current_sample(0), 0.0);
    }

    #[test]
    fn test_registered_programs_resolve() {
        let mut provider = GenericInstrumentProvider::new();
        provider.insert(0, Arc::new(SelectMidiInstrument::new("piano")));
        assert_eq!(provider.instrument(0).name(), "piano");
        assert_eq!(provider.instrument(1).name(), "");
    }
}
