//! Simulated-time rate controller.

use crate::error::Result;
use crate::ramp::{exp_trap_area, rect_area, sgn, trap_area, Ramp};
use crate::source::{shared, AudioSource, NodeId, SharedSource};

/// Scales the flow of simulated time into its child.
///
/// At rest, `advance_time(dt)` delivers `dt * scale` to the child. While a
/// ramp toward a target scale is active, the delivered duration is the exact
/// area under the ramp over `dt`, so pitch glides stay continuous no matter
/// how the interval is sliced.
///
/// Exponential ramps require `scale > 0` and a positive target.
pub struct TimeScale {
    id: NodeId,
    source: SharedSource,
    scale: f64,
    target: f64,
    speed: f64,
    ramp: Ramp,
}

impl TimeScale {
    pub fn new(source: SharedSource, scale: f64) -> Self {
        Self {
            id: NodeId::fresh(),
            source,
            scale,
            target: scale,
            speed: 1.0,
            ramp: Ramp::Linear,
        }
    }

    /// Current rate multiplier.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Begin ramping toward `target` at `speed` units (Linear) or log-units
    /// (Exponential) per second. A speed of zero freezes the current scale.
    pub fn set_scale(&mut self, target: f64, speed: f64, ramp: Ramp) {
        self.target = target;
        self.speed = speed;
        self.ramp = ramp;
    }

    /// Seconds until the active ramp reaches its target: zero when already on
    /// target, infinite when frozen.
    pub fn stabilize_time(&self) -> f64 {
        if self.target == self.scale {
            return 0.0;
        }
        if self.speed == 0.0 {
            return f64::INFINITY;
        }
        match self.ramp {
            Ramp::Linear => (self.target - self.scale).abs() / self.speed,
            Ramp::Exponential => (self.target.ln() - self.scale.ln()).abs() / self.speed,
        }
    }
}

impl AudioSource for TimeScale {
    fn current_sample(&self, channel: usize) -> f32 {
        self.source.lock().current_sample(channel)
    }

    fn advance_time(&mut self, delta_time: f64) {
        let delta_scale = self.target - self.scale;
        if delta_scale == 0.0 || self.speed == 0.0 {
            self.source.lock().advance_time(delta_time * self.scale);
            return;
        }
        let effective = match self.ramp {
            Ramp::Linear => {
                let stabilize = delta_scale.abs() / self.speed;
                if delta_time >= stabilize {
                    let area = trap_area(stabilize, self.scale, self.target)
                        + rect_area(delta_time - stabilize, self.target);
                    self.scale = self.target;
                    area
                } else {
                    let next = self.scale + f64::from(sgn(delta_scale)) * self.speed * delta_time;
                    let area = trap_area(delta_time, self.scale, next);
                    self.scale = next;
                    area
                }
            }
            Ramp::Exponential => {
                let delta_log = self.target.ln() - self.scale.ln();
                let stabilize = delta_log.abs() / self.speed;
                if delta_time >= stabilize {
                    let area = exp_trap_area(stabilize, self.scale, self.target)
                        + rect_area(delta_time - stabilize, self.target);
                    self.scale = self.target;
                    area
                } else {
                    let next = (self.scale.ln()
                        + f64::from(sgn(delta_log)) * self.speed * delta_time)
                        .exp();
                    let area = exp_trap_area(delta_time, self.scale, next);
                    self.scale = next;
                    area
                }
            }
        };
        self.source.lock().advance_time(effective);
    }

    fn duplicate(&self) -> Result<SharedSource> {
        let mut copy = TimeScale::new(self.source.lock().duplicate()?, self.scale);
        copy.set_scale(self.target, self.speed, self.ramp);
        Ok(shared(copy))
    }

    fn id(&self) -> NodeId {
        self.id
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(SharedSource)) {
        visit(self.source.clone());
    }
}
