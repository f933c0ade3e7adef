//! Gain controller with soft-log exponential ramps.

use crate::error::Result;
use crate::ramp::{modified_exp, modified_log, sgn, Ramp};
use crate::source::{shared, AudioSource, NodeId, SharedSource};

/// Multiplies its child's samples by a ramped gain.
///
/// Unlike [`TimeScale`](crate::TimeScale), time is not compressed: the child
/// always advances by the raw `dt`, and only the gain moves toward its
/// target. Exponential ramps run on a soft-log scale, so the gain can reach
/// and cross zero without a singularity.
pub struct Amplify {
    id: NodeId,
    source: SharedSource,
    amplitude: f64,
    target: f64,
    speed: f64,
    ramp: Ramp,
}

impl Amplify {
    pub fn new(source: SharedSource, amplitude: f64) -> Self {
        Self {
            id: NodeId::fresh(),
            source,
            amplitude,
            target: amplitude,
            speed: 1.0,
            ramp: Ramp::Linear,
        }
    }

    /// Current gain.
    #[inline]
    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// Begin ramping toward `target` at `speed` units (Linear) or soft-log
    /// units (Exponential) per second. A speed of zero freezes the gain.
    pub fn set_amplitude(&mut self, target: f64, speed: f64, ramp: Ramp) {
        self.target = target;
        self.speed = speed;
        self.ramp = ramp;
    }

    /// Seconds until the active ramp reaches its target: zero when already on
    /// target, infinite when frozen.
    pub fn stabilize_time(&self) -> f64 {
        if self.target == self.amplitude {
            return 0.0;
        }
        if self.speed == 0.0 {
            return f64::INFINITY;
        }
        match self.ramp {
            Ramp::Linear => (self.target - self.amplitude).abs() / self.speed,
            Ramp::Exponential => {
                (modified_log(self.target) - modified_log(self.amplitude)).abs() / self.speed
            }
        }
    }
}

impl AudioSource for Amplify {
    fn current_sample(&self, channel: usize) -> f32 {
        self.amplitude as f32 * self.source.lock().current_sample(channel)
    }

    fn advance_time(&mut self, delta_time: f64) {
        self.source.lock().advance_time(delta_time);
        let delta = self.target - self.amplitude;
        if delta == 0.0 || self.speed == 0.0 {
            return;
        }
        match self.ramp {
            Ramp::Linear => {
                let stabilize = delta.abs() / self.speed;
                if delta_time >= stabilize {
                    self.amplitude = self.target;
                } else {
                    self.amplitude += f64::from(sgn(delta)) * self.speed * delta_time;
                }
            }
            Ramp::Exponential => {
                let delta_log = modified_log(self.target) - modified_log(self.amplitude);
                let stabilize = delta_log.abs() / self.speed;
                if delta_time >= stabilize {
                    self.amplitude = self.target;
                } else {
                    self.amplitude = modified_exp(
                        modified_log(self.amplitude)
                            + f64::from(sgn(delta_log)) * self.speed * delta_time,
                    );
                }
            }
        }
    }

    fn duplicate(&self) -> Result<SharedSource> {
        let mut copy = Amplify::new(self.source.lock().duplicate()?, self.amplitude);
        copy.set_amplitude(self.target, self.speed, self.ramp);
        Ok(shared(copy))
    }

    fn id(&self) -> NodeId {
        self.id
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(SharedSource)) {
        visit(self.source.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Silence, Sine};
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_constant_gain_scales_the_child() {
        let mut sine = Sine::new(440.0, 1.0);
        sine.advance_time(0.0003);
        let expected = 0.25 * sine.current_sample(0);
        let amplify = Amplify::new(shared(sine), 0.25);
        assert_relative_eq!(amplify.current_sample(0), expected, epsilon = 1e-7);
    }

    #[test]
    fn test_child_receives_uncompressed_time() {
        let mut inner = Sine::new(100.0, 1.0);
        inner.advance_time(0.003);
        let reference = inner.current_sample(0);

        let mut amplify = Amplify::new(shared(Sine::new(100.0, 1.0)), 4.0);
        amplify.set_amplitude(0.0, 1.0, Ramp::Linear);
        amplify.advance_time(0.003);
        let scaled = amplify.current_sample(0) / amplify.amplitude() as f32;
        assert_abs_diff_eq!(scaled, reference, epsilon = 1e-6);
    }

    #[test]
    fn test_linear_ramp_reaches_target_and_stops() {
        let mut amplify = Amplify::new(shared(Silence::new()), 1.0);
        amplify.set_amplitude(0.5, 2.0, Ramp::Linear);
        assert_relative_eq!(amplify.stabilize_time(), 0.25);
        amplify.advance_time(0.1);
        assert_relative_eq!(amplify.amplitude(), 0.8);
        amplify.advance_time(10.0);
        assert_relative_eq!(amplify.amplitude(), 0.5);
        assert_eq!(amplify.stabilize_time(), 0.0);
    }

    #[test]
    fn test_exponential_ramp_from_zero_stays_finite() {
        let mut amplify = Amplify::new(shared(Silence::new()), 0.0);
        amplify.set_amplitude(1.0, 1e-6, Ramp::Exponential);
        let mut previous = 0.0;
        for _ in 0..100 {
            amplify.advance_time(1.0);
            let amplitude = amplify.amplitude();
            assert!(amplitude.is_finite());
            assert!(amplitude >= previous);
            assert!(amplitude <= 1.0);
            previous = amplitude;
        }
    }

    #[test]
    fn test_exponential_ramp_decays_to_zero() {
        let mut amplify = Amplify::new(shared(Silence::new()), 1.0);
        amplify.set_amplitude(0.0, 5.0, Ramp::Exponential);
        let stabilize = amplify.stabilize_time();
        assert!(stabilize.is_finite());
        amplify.advance_time(stabilize);
        assert_relative_eq!(amplify.amplitude(), 0.0);
        assert_eq!(amplify.stabilize_time(), 0.0);
    }
}
