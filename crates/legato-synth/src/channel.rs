//! The per-channel note multiplexer.

use std::sync::Arc;

use parking_lot::Mutex;

use legato_core::{
    Amplify, AudioSource, Error as CoreError, Mix, NodeId, Ramp, Result as CoreResult,
    SharedSource, SlotId,
};

use crate::error::Result;
use crate::instrument::MidiInstrument;
use crate::key::{key_source, SharedKey};
use crate::note::{is_valid_key, DEFAULT_VELOCITY, INVALID_KEY};

/// Ramp rate for volume changes while notes are sounding.
const VOLUME_RAMP_SPEED: f64 = 10.0;

struct PlayingVoice {
    voice: SharedKey,
    slot: SlotId,
}

/// Multiplexes note events into voices on a shared mixer.
///
/// The channel owns a voice bus (a [`Mix`] behind a volume [`Amplify`]), a
/// per-key table of active voices, and the list of voices still sounding.
/// Released voices stay on the bus until their envelope settles, then are
/// swept out during `advance_time`.
///
/// Operations on keys outside `0..=127` are silently ignored.
pub struct MidiChannel {
    id: NodeId,
    mixer: Arc<Mutex<Mix>>,
    amplifier: Arc<Mutex<Amplify>>,
    instrument: Arc<dyn MidiInstrument>,
    voices: [Option<SharedKey>; 128],
    playing: Vec<PlayingVoice>,
    slide_from_key: i32,
    pitch_bend_semitones: f64,
}

impl MidiChannel {
    pub fn new(instrument: Arc<dyn MidiInstrument>) -> Self {
        let mixer = Arc::new(Mutex::new(Mix::new()));
        let mixer_source = Arc::clone(&mixer);
        let amplifier = Arc::new(Mutex::new(Amplify::new(mixer_source, 1.0)));
        Self {
            id: NodeId::fresh(),
            mixer,
            amplifier,
            instrument,
            voices: std::array::from_fn(|_| None),
            playing: Vec::new(),
            slide_from_key: INVALID_KEY,
            pitch_bend_semitones: 0.0,
        }
    }

    pub fn instrument(&self) -> &Arc<dyn MidiInstrument> {
        &self.instrument
    }

    /// Swap the instrument used for new notes; sounding voices keep the old
    /// one.
    pub fn set_instrument(&mut self, instrument: Arc<dyn MidiInstrument>) {
        self.instrument = instrument;
    }

    /// Number of voices still sounding, including released ones.
    pub fn active_voices(&self) -> usize {
        self.playing.len()
    }

    /// Current channel volume.
    pub fn volume(&self) -> f64 {
        self.amplifier.lock().amplitude()
    }

    /// Start a note. A velocity of zero is a note-off.
    ///
    /// If a slide origin is pending, the new note either takes over that
    /// still-sounding voice or starts at the origin key and glides to `key`.
    ///
    /// The only failure is an instrument whose prototype cannot be
    /// duplicated.
    pub fn note_on(&mut self, key: i32, velocity: i32) -> Result<()> {
        if !is_valid_key(key) {
            return Ok(());
        }
        if velocity == 0 {
            self.note_off(key, DEFAULT_VELOCITY);
            return Ok(());
        }
        if let Some(voice) = self.voices[key as usize].take() {
            voice.lock().stop(DEFAULT_VELOCITY);
        }
        if is_valid_key(self.slide_from_key) {
            if let Some(voice) = self.voices[self.slide_from_key as usize].take() {
                voice.lock().slide_to(key, velocity);
                self.voices[key as usize] = Some(voice);
                self.slide_from_key = INVALID_KEY;
                return Ok(());
            }
        }
        let mut start_key = key;
        if is_valid_key(self.slide_from_key) && self.instrument.supports_slide(self.slide_from_key)
        {
            start_key = self.slide_from_key;
        }
        self.slide_from_key = INVALID_KEY;

        let voice = self.instrument.generate(start_key, velocity, self.pitch_bend_semitones)?;
        if start_key != key {
            voice.lock().slide_to(key, velocity);
        }
        let slot = self.mixer.lock().insert(key_source(&voice), 1.0)?;
        self.playing.push(PlayingVoice {
            voice: Arc::clone(&voice),
            slot,
        });
        self.voices[key as usize] = Some(voice);
        Ok(())
    }

    /// Release a note. The voice keeps sounding until its release envelope
    /// settles.
    pub fn note_off(&mut self, key: i32, velocity: i32) {
        if !is_valid_key(key) {
            return;
        }
        if let Some(voice) = self.voices[key as usize].take() {
            voice.lock().stop(velocity);
        }
    }

    /// Mark `key` as the origin of a slide: the next note-on continues from
    /// it instead of re-attacking.
    pub fn slide_from(&mut self, key: i32) {
        if !is_valid_key(key) {
            return;
        }
        self.slide_from_key = key;
    }

    /// Apply aftertouch pressure to the voice holding `key`.
    pub fn aftertouch(&mut self, key: i32, velocity: i32) {
        if !is_valid_key(key) {
            return;
        }
        if let Some(voice) = &self.voices[key as usize] {
            voice.lock().aftertouch(velocity);
        }
    }

    /// Apply aftertouch pressure to every held voice.
    pub fn aftertouch_all(&mut self, velocity: i32) {
        for voice in self.voices.iter().flatten() {
            voice.lock().aftertouch(velocity);
        }
    }

    /// Set the channel volume: instantaneous while the channel is idle,
    /// otherwise a fast exponential ramp.
    pub fn set_volume(&mut self, volume: f32) {
        if self.playing.is_empty() {
            let mixer_source = Arc::clone(&self.mixer);
            self.amplifier = Arc::new(Mutex::new(Amplify::new(
                mixer_source,
                f64::from(volume),
            )));
        } else {
            self.amplifier
                .lock()
                .set_amplitude(f64::from(volume), VOLUME_RAMP_SPEED, Ramp::Exponential);
        }
    }

    /// Bend every sounding voice and remember the bend for voices started
    /// later.
    pub fn pitch_bend(&mut self, semitones: f64) {
        self.pitch_bend_semitones = semitones;
        for playing in &self.playing {
            playing.voice.lock().pitch_bend(semitones);
        }
    }
}

impl AudioSource for MidiChannel {
    fn current_sample(&self, channel: usize) -> f32 {
        self.amplifier.lock().current_sample(channel)
    }

    fn advance_time(&mut self, delta_time: f64) {
        self.amplifier.lock().advance_time(delta_time);
        let mixer = &self.mixer;
        self.playing.retain(|playing| {
            if playing.voice.lock().finished() {
                mixer.lock().remove(playing.slot);
                false
            } else {
                true
            }
        });
    }

    fn duplicate(&self) -> CoreResult<SharedSource> {
        Err(CoreError::NotDuplicable)
    }

    fn id(&self) -> NodeId {
        self.id
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(SharedSource)) {
        let amplifier = Arc::clone(&self.amplifier);
        visit(amplifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::GenericMidiInstrument;
    use crate::key::VoiceParams;
    use approx::assert_relative_eq;
    use legato_core::{shared, Sine};

    fn instrument(slide_speed: f64) -> Arc<dyn MidiInstrument> {
        Arc::new(GenericMidiInstrument::new(
            "test",
            shared(Sine::new(440.0, 1.0)),
            VoiceParams {
                source_base_key: 69.0,
                attack_speed: VoiceParams::INSTANTANEOUS_ATTACK,
                decay_speed: 1.0,
                sustain_speed: 0.1,
                release_speed: 50.0,
                release_speed_variance: 0.0,
                slide_speed,
                aftertouch_speed: 0.0,
                attack_amplitude: 1.0,
                decay_amplitude: 0.5,
            },
        ))
    }

    fn channel(slide_speed: f64) -> MidiChannel {
        MidiChannel::new(instrument(slide_speed))
    }

    #[test]
    fn test_note_on_adds_a_voice_to_the_bus() {
        let mut channel = channel(0.0);
        channel.note_on(69, DEFAULT_VELOCITY).unwrap();
        assert_eq!(channel.active_voices(), 1);
        channel.advance_time(0.0003);
        assert!(channel.current_sample(0).abs() > 1e-3);
    }

    #[test]
    fn test_zero_velocity_is_a_note_off() {
        let mut channel = channel(0.0);
        channel.note_on(69, DEFAULT_VELOCITY).unwrap();
        channel.note_on(69, 0).unwrap();
        // Released but still sounding until the envelope settles.
        assert_eq!(channel.active_voices(), 1);
        channel.advance_time(2.0);
        assert_eq!(channel.active_voices(), 0);
    }

    #[test]
    fn test_released_voices_are_swept_once_finished() {
        let mut channel = channel(0.0);
        channel.note_on(60, DEFAULT_VELOCITY).unwrap();
        channel.note_on(64, DEFAULT_VELOCITY).unwrap();
        channel.note_off(60, DEFAULT_VELOCITY);
        channel.advance_time(2.0);
        // The released voice is gone, the held one remains.
        assert_eq!(channel.active_voices(), 1);
    }

    #[test]
    fn test_retriggering_a_key_stops_the_old_voice() {
        let mut channel = channel(0.0);
        channel.note_on(69, DEFAULT_VELOCITY).unwrap();
        channel.note_on(69, DEFAULT_VELOCITY).unwrap();
        // Both voices are on the bus until the stopped one fades.
        assert_eq!(channel.active_voices(), 2);
        channel.advance_time(2.0);
        assert_eq!(channel.active_voices(), 1);
    }

    #[test]
    fn test_slide_takes_over_the_sounding_voice() {
        let mut channel = channel(1.0);
        channel.note_on(60, DEFAULT_VELOCITY).unwrap();
        channel.slide_from(60);
        channel.note_on(67, DEFAULT_VELOCITY).unwrap();
        // The original voice slid instead of a second one starting.
        assert_eq!(channel.active_voices(), 1);
        // A note-off on the new key releases it.
        channel.note_off(67, DEFAULT_VELOCITY);
        channel.advance_time(2.0);
        assert_eq!(channel.active_voices(), 0);
    }

    #[test]
    fn test_slide_from_a_silent_key_starts_at_the_origin() {
        let mut channel = channel(1.0);
        channel.slide_from(60);
        channel.note_on(67, DEFAULT_VELOCITY).unwrap();
        assert_eq!(channel.active_voices(), 1);
    }

    #[test]
    fn test_invalid_keys_are_ignored() {
        let mut channel = channel(0.0);
        channel.note_on(INVALID_KEY, DEFAULT_VELOCITY).unwrap();
        channel.note_on(128, DEFAULT_VELOCITY).unwrap();
        channel.note_off(200, DEFAULT_VELOCITY);
        channel.aftertouch(-5, DEFAULT_VELOCITY);
        assert_eq!(channel.active_voices(), 0);
    }

    #[test]
    fn test_set_volume_is_instantaneous_when_idle() {
        let mut channel = channel(0.0);
        channel.set_volume(0.25);
        assert_relative_eq!(channel.volume(), 0.25);
    }

    #[test]
    fn test_set_volume_ramps_while_sounding() {
        let mut channel = channel(0.0);
        channel.note_on(69, DEFAULT_VELOCITY).unwrap();
        channel.set_volume(0.25);
        // Not there yet; ramping.
        assert_relative_eq!(channel.volume(), 1.0);
        channel.advance_time(1.0);
        assert_relative_eq!(channel.volume(), 0.25);
    }

    #[test]
    fn test_channel_is_not_duplicable() {
        let channel = channel(0.0);
        assert!(matches!(channel.duplicate(), Err(CoreError::NotDuplicable)));
    }
}
