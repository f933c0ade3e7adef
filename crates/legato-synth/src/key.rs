//! Per-voice ADSR state machine.

use std::sync::Arc;

use parking_lot::Mutex;

use legato_core::{
    Amplify, AudioSource, Error as CoreError, NodeId, Ramp, Result as CoreResult, SharedSource,
    TimeScale,
};

use crate::note::{relative_frequency, DEFAULT_VELOCITY, PITCH_BEND_SPEED};

/// A sounding voice driven by the MIDI note lifecycle.
///
/// Voices are audio sources, but they are never duplicable: a live envelope
/// cannot be meaningfully copied.
pub trait MidiKey: AudioSource {
    /// Post-attack pressure: ramp the velocity gain toward `velocity`.
    fn aftertouch(&mut self, velocity: i32);

    /// Enter the release stage with the given note-off velocity.
    fn stop(&mut self, velocity: i32);

    /// Glide the sounding pitch toward `key`.
    fn slide_to(&mut self, key: i32, velocity: i32);

    /// Ramp the pitch-bend offset, in semitones.
    fn pitch_bend(&mut self, semitones: f64);

    /// True once the release envelope has fully settled.
    fn finished(&self) -> bool;
}

/// Shared handle to a voice.
pub type SharedKey = Arc<Mutex<dyn MidiKey>>;

/// Wrap a voice for the channel mixer.
pub fn shared_key<K: MidiKey + 'static>(key: K) -> SharedKey {
    Arc::new(Mutex::new(key))
}

/// View a voice as a plain graph source.
#[inline]
pub fn key_source(key: &SharedKey) -> SharedSource {
    let key = Arc::clone(key);
    key
}

/// Envelope and articulation parameters shared by all voices of an
/// instrument.
///
/// Speeds are in amplitude units (linear stages) or soft-log units
/// (exponential stages) per second; a speed of zero disables the matching
/// articulation.
#[derive(Debug, Clone, Copy)]
pub struct VoiceParams {
    /// The key the underlying source plays at unit rate.
    pub source_base_key: f64,
    /// Attack ramp speed, or [`VoiceParams::INSTANTANEOUS_ATTACK`].
    pub attack_speed: f64,
    pub decay_speed: f64,
    /// Decay rate of the held sustain stage.
    pub sustain_speed: f64,
    pub release_speed: f64,
    /// Spread of the release speed with note-off velocity: the effective
    /// speed is `release_speed * 2^(variance * (velocity / default - 1))`.
    pub release_speed_variance: f64,
    pub slide_speed: f64,
    pub aftertouch_speed: f64,
    pub attack_amplitude: f32,
    pub decay_amplitude: f32,
}

impl VoiceParams {
    /// Sentinel attack speed: the voice starts at `attack_amplitude` and goes
    /// straight to the decay stage.
    pub const INSTANTANEOUS_ATTACK: f64 = -1.0;
}

/// Envelope stage of a [`GenericMidiKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStage {
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Stage boundaries closer than this are crossed without advancing time.
const STAGE_EPSILON: f64 = 1e-10;

/// The standard voice: an ADSR gain over a pitch-scaled source.
///
/// The chain below the voice is
/// `velocity gain -> ADSR gain -> key scaler -> pitch-bend scaler -> source`;
/// the key scaler carries slides and the pitch-bend scaler carries channel
/// bend, both as exponential rate ramps.
pub struct GenericMidiKey {
    id: NodeId,
    velocity: Arc<Mutex<Amplify>>,
    adsr: Arc<Mutex<Amplify>>,
    time_scaler: Arc<Mutex<TimeScale>>,
    pitch_bend_scaler: Arc<Mutex<TimeScale>>,
    params: VoiceParams,
    stage: VoiceStage,
}

impl GenericMidiKey {
    pub fn new(
        key: i32,
        start_velocity: i32,
        pitch_bend_semitones: f64,
        source: SharedSource,
        params: VoiceParams,
    ) -> Self {
        let pitch_bend_scaler = Arc::new(Mutex::new(TimeScale::new(
            source,
            relative_frequency(pitch_bend_semitones),
        )));
        let pitch_bend_scaler_source = Arc::clone(&pitch_bend_scaler);
        let time_scaler = Arc::new(Mutex::new(TimeScale::new(
            pitch_bend_scaler_source,
            relative_frequency(f64::from(key) - params.source_base_key),
        )));

        let (adsr, stage) = if params.attack_speed <= 0.0 {
            let time_scaler_source = Arc::clone(&time_scaler);
            let mut adsr = Amplify::new(time_scaler_source, f64::from(params.attack_amplitude));
            adsr.set_amplitude(
                f64::from(params.decay_amplitude),
                params.decay_speed,
                Ramp::Linear,
            );
            (adsr, VoiceStage::Decay)
        } else {
            let time_scaler_source = Arc::clone(&time_scaler);
            let mut adsr = Amplify::new(time_scaler_source, 0.0);
            adsr.set_amplitude(
                f64::from(params.attack_amplitude),
                params.attack_speed,
                Ramp::Linear,
            );
            (adsr, VoiceStage::Attack)
        };
        let adsr = Arc::new(Mutex::new(adsr));
        let adsr_source = Arc::clone(&adsr);
        let velocity = Arc::new(Mutex::new(Amplify::new(
            adsr_source,
            f64::from(start_velocity) / f64::from(DEFAULT_VELOCITY),
        )));

        Self {
            id: NodeId::fresh(),
            velocity,
            adsr,
            time_scaler,
            pitch_bend_scaler,
            params,
            stage,
        }
    }

    /// Current envelope stage.
    #[inline]
    pub fn stage(&self) -> VoiceStage {
        self.stage
    }

    /// Current ADSR gain.
    pub fn envelope_amplitude(&self) -> f64 {
        self.adsr.lock().amplitude()
    }

    fn enter_next_stage(&mut self) {
        match self.stage {
            VoiceStage::Attack => {
                self.stage = VoiceStage::Decay;
                self.adsr.lock().set_amplitude(
                    f64::from(self.params.decay_amplitude),
                    self.params.decay_speed,
                    Ramp::Linear,
                );
            }
            VoiceStage::Decay => {
                self.stage = VoiceStage::Sustain;
                self.adsr
                    .lock()
                    .set_amplitude(0.0, self.params.sustain_speed, Ramp::Exponential);
            }
            VoiceStage::Sustain | VoiceStage::Release => {}
        }
    }
}

impl MidiKey for GenericMidiKey {
    fn aftertouch(&mut self, velocity: i32) {
        if self.params.aftertouch_speed <= 0.0 || self.stage == VoiceStage::Release {
            return;
        }
        self.velocity.lock().set_amplitude(
            f64::from(velocity) / f64::from(DEFAULT_VELOCITY),
            self.params.aftertouch_speed,
            Ramp::Exponential,
        );
    }

    fn stop(&mut self, velocity: i32) {
        self.stage = VoiceStage::Release;
        let effective_speed = self.params.release_speed
            * (self.params.release_speed_variance
                * (f64::from(velocity) / f64::from(DEFAULT_VELOCITY) - 1.0))
                .exp2();
        self.adsr
            .lock()
            .set_amplitude(0.0, effective_speed, Ramp::Exponential);
    }

    fn slide_to(&mut self, key: i32, _velocity: i32) {
        if self.params.slide_speed <= 0.0 || self.stage == VoiceStage::Release {
            return;
        }
        self.time_scaler.lock().set_scale(
            relative_frequency(f64::from(key) - self.params.source_base_key),
            self.params.slide_speed,
            Ramp::Exponential,
        );
    }

    fn pitch_bend(&mut self, semitones: f64) {
        self.pitch_bend_scaler.lock().set_scale(
            relative_frequency(semitones),
            PITCH_BEND_SPEED,
            Ramp::Exponential,
        );
    }

    fn finished(&self) -> bool {
        self.stage == VoiceStage::Release && self.adsr.lock().stabilize_time() == 0.0
    }
}

impl AudioSource for GenericMidiKey {
    fn current_sample(&self, channel: usize) -> f32 {
        self.velocity.lock().current_sample(channel)
    }

    /// Advance in stage-sized slices so each envelope stage hands over at its
    /// exact stabilization point.
    fn advance_time(&mut self, mut delta_time: f64) {
        while delta_time > 0.0 {
            let stabilize_time = self.adsr.lock().stabilize_time();
            if stabilize_time > delta_time {
                self.velocity.lock().advance_time(delta_time);
                return;
            }
            let crossing_now = stabilize_time <= STAGE_EPSILON;
            if !crossing_now {
                self.velocity.lock().advance_time(stabilize_time);
                delta_time -= stabilize_time;
            }
            self.enter_next_stage();
            if crossing_now {
                self.velocity.lock().advance_time(delta_time);
                return;
            }
        }
    }

    fn duplicate(&self) -> CoreResult<SharedSource> {
        Err(CoreError::NotDuplicable)
    }

    fn id(&self) -> NodeId {
        self.id
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(SharedSource)) {
        let velocity = Arc::clone(&self.velocity);
        visit(velocity);
    }
}

/// A voice that produces nothing and finishes as soon as it is stopped.
///
/// Stands in when an instrument has no coverage for a key.
pub struct SilenceMidiKey {
    id: NodeId,
    stopped: bool,
}

impl SilenceMidiKey {
    pub fn new() -> Self {
        Self {
            id: NodeId::fresh(),
            stopped: false,
        }
    }
}

impl Default for SilenceMidiKey {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiKey for SilenceMidiKey {
    fn aftertouch(&mut self, _velocity: i32) {}

    fn stop(&mut self, _velocity: i32) {
        self.stopped = true;
    }

    fn slide_to(&mut self, _key: i32, _velocity: i32) {}

    fn pitch_bend(&mut self, _semitones: f64) {}

    fn finished(&self) -> bool {
        self.stopped
    }
}

impl AudioSource for SilenceMidiKey {
    fn current_sample(&self, _channel: usize) -> f32 {
        0.0
    }

    fn advance_time(&mut self, _delta_time: f64) {}

    fn duplicate(&self) -> CoreResult<SharedSource> {
        Err(CoreError::NotDuplicable)
    }

    fn id(&self) -> NodeId {
        self.id
    }
}
