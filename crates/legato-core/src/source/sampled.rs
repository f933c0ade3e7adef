//! Sampled playback with linear interpolation and loop decay.

use std::sync::Arc;

use crate::audio_data::AudioData;
use crate::error::Result;
use crate::source::{shared, AudioSource, NodeId, SharedSource};

/// Loop decay below this amplitude reads as permanent silence.
const SILENCE_FLOOR: f32 = 1e-10;

/// Plays an [`AudioData`] buffer, linearly interpolating between frames.
///
/// A looped buffer rewinds to its loop start each time the cursor passes the
/// end, decaying by the buffer's `loop_decay_amplitude` per traversal until
/// the voice falls silent.
pub struct Sampled {
    id: NodeId,
    data: Arc<AudioData>,
    cursor: f64,
    amplitude: f32,
}

impl Sampled {
    pub fn new(data: Arc<AudioData>) -> Self {
        Self {
            id: NodeId::fresh(),
            data,
            cursor: 0.0,
            amplitude: 1.0,
        }
    }

    /// True once a non-looped buffer has been read past its last frame.
    pub fn finished(&self) -> bool {
        !self.data.looped && self.cursor >= self.data.len() as f64
    }

    /// Current loop-decay amplitude.
    #[inline]
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    fn frame_sample(&self, index: usize, channel: usize) -> f32 {
        self.data
            .frames
            .get(index)
            .and_then(|frame| frame.get(channel))
            .copied()
            .unwrap_or(0.0)
    }

    /// Resolve a read index against the loop window, decaying once per
    /// traversal the index lies beyond the end.
    fn looped_sample(&self, mut index: usize, channel: usize) -> f32 {
        let len = self.data.len();
        let mut gain = self.amplitude;
        while index >= len {
            gain *= self.data.loop_decay_amplitude;
            if gain < SILENCE_FLOOR {
                return 0.0;
            }
            index = index + self.data.loop_start - len;
        }
        gain * self.frame_sample(index, channel)
    }
}

impl AudioSource for Sampled {
    fn current_sample(&self, channel: usize) -> f32 {
        if self.data.is_empty() || self.finished() || self.amplitude <= SILENCE_FLOOR {
            return 0.0;
        }
        let base = self.cursor.floor();
        let t = (self.cursor - base) as f32;
        let index = base as usize;
        let (sample1, sample2) = if self.data.looped {
            (
                self.looped_sample(index, channel),
                self.looped_sample(index + 1, channel),
            )
        } else {
            (
                self.frame_sample(index, channel),
                self.frame_sample(index + 1, channel),
            )
        };
        t * sample1 + (1.0 - t) * sample2
    }

    fn advance_time(&mut self, delta_time: f64) {
        if self.data.is_empty() {
            return;
        }
        self.cursor += delta_time * self.data.sample_rate;
        let len = self.data.len() as f64;
        while self.data.looped && self.cursor >= len && self.amplitude > SILENCE_FLOOR {
            self.cursor += self.data.loop_start as f64 - len;
            self.amplitude *= self.data.loop_decay_amplitude;
        }
    }

    fn duplicate(&self) -> Result<SharedSource> {
        Ok(shared(Self {
            id: NodeId::fresh(),
            data: Arc::clone(&self.data),
            cursor: self.cursor,
            amplitude: self.amplitude,
        }))
    }

    fn id(&self) -> NodeId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp_data(values: &[f32], sample_rate: f64) -> Arc<AudioData> {
        Arc::new(AudioData::new(
            values.iter().map(|&value| [value, -value]).collect(),
            sample_rate,
        ))
    }

    #[test]
    fn test_interpolation_weights_the_floor_frame_by_the_fraction() {
        let mut sampled = Sampled::new(ramp_data(&[1.0, 3.0, 5.0], 4.0));
        // Cursor lands at 0.25: the floor frame contributes `t`, the next
        // frame `1 - t`.
        sampled.advance_time(1.0 / 16.0);
        assert_relative_eq!(sampled.current_sample(0), 0.25 * 1.0 + 0.75 * 3.0, epsilon = 1e-6);
        assert_relative_eq!(sampled.current_sample(1), -(0.25 * 1.0 + 0.75 * 3.0), epsilon = 1e-6);
    }

    #[test]
    fn test_tail_neighbor_past_the_end_reads_zero() {
        let mut sampled = Sampled::new(ramp_data(&[0.0, 0.0, 2.0], 1.0));
        sampled.advance_time(2.5);
        // Only the last frame is left; its missing neighbor contributes
        // silence, exactly like the looped branch treats an exhausted loop.
        assert_relative_eq!(sampled.current_sample(0), 0.5 * 2.0, epsilon = 1e-6);
        sampled.advance_time(0.25);
        assert_relative_eq!(sampled.current_sample(0), 0.75 * 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_finishes_past_the_end() {
        let mut sampled = Sampled::new(ramp_data(&[1.0, 1.0], 2.0));
        assert!(!sampled.finished());
        sampled.advance_time(1.0);
        assert!(sampled.finished());
        assert_eq!(sampled.current_sample(0), 0.0);
    }

    #[test]
    fn test_loop_decays_per_traversal() {
        let data = Arc::new(AudioData::new(vec![[1.0, 1.0]; 8], 8.0).with_loop(4, 8, 0.5));
        let mut sampled = Sampled::new(data);
        sampled.advance_time(1.0); // one full buffer: wraps once
        assert_relative_eq!(sampled.amplitude(), 0.5);
        sampled.advance_time(0.5); // one loop window: wraps again
        assert_relative_eq!(sampled.amplitude(), 0.25);
        assert!(!sampled.finished());
    }

    #[test]
    fn test_loop_runs_out_below_the_silence_floor() {
        let data = Arc::new(AudioData::new(vec![[1.0, 1.0]; 4], 4.0).with_loop(0, 4, 1e-4));
        let mut sampled = Sampled::new(data);
        for _ in 0..4 {
            sampled.advance_time(1.0);
        }
        assert!(sampled.amplitude() <= SILENCE_FLOOR);
        assert_eq!(sampled.current_sample(0), 0.0);
    }

    #[test]
    fn test_duplicate_preserves_cursor_and_amplitude() {
        let data = Arc::new(AudioData::new(vec![[1.0, 0.0]; 8], 8.0).with_loop(0, 8, 0.5));
        let mut sampled = Sampled::new(data);
        sampled.advance_time(1.25);
        let copy = sampled.duplicate().unwrap();
        assert_eq!(copy.lock().current_sample(0), sampled.current_sample(0));
    }
}
