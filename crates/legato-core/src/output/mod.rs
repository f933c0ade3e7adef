//! Device output bridge over CPAL.
//!
//! Pulls one frame at a time from a bound root source inside the device
//! callback and hands the controlling thread a lock that serializes graph
//! mutation against buffer fills.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::{Mutex, MutexGuard};
use tracing::info;

use crate::channels::{mix_frame, CHANNELS};
use crate::error::{Error, Result};
use crate::source::SharedSource;

/// Preferred stream parameters; the device may renegotiate both.
const PREFERRED_SAMPLE_RATE: u32 = 44_100;
const PREFERRED_BUFFER_FRAMES: u32 = 4096;

/// One device output per process.
static DEVICE_IN_USE: AtomicBool = AtomicBool::new(false);

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
///
/// `cpal::Stream` is `!Send` due to platform internals. This is safe because
/// the stream is never touched after construction: it lives for the lifetime
/// of the bridge and is only paused and dropped from `Drop`.
struct StreamHandle(cpal::Stream);

// SAFETY: see `StreamHandle`.
unsafe impl Send for StreamHandle {}

/// The bridge between the source graph and the host audio device.
///
/// The callback acquires the bridge lock for the duration of one buffer fill;
/// controller code must hold the same lock while mutating any node reachable
/// from the bound root. Dropping the bridge pauses and closes the stream
/// before releasing the process-wide device flag.
pub struct AudioOutput {
    root: Arc<Mutex<Option<SharedSource>>>,
    sample_rate: f64,
    channels: usize,
    stream: Option<StreamHandle>,
}

impl AudioOutput {
    /// Open the default output device.
    ///
    /// Fails with [`Error::DeviceBusy`] if another bridge is live; any other
    /// construction failure releases the busy flag again.
    pub fn new() -> Result<Self> {
        if DEVICE_IN_USE.swap(true, Ordering::SeqCst) {
            return Err(Error::DeviceBusy);
        }
        match Self::open() {
            Ok(output) => Ok(output),
            Err(error) => {
                DEVICE_IN_USE.store(false, Ordering::SeqCst);
                Err(error)
            }
        }
    }

    fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(Error::NoOutputDevice)?;
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();

        let mut config: cpal::StreamConfig = supported.config();
        if supports_preferred_rate(&device, sample_format, config.channels) {
            config.sample_rate = cpal::SampleRate(PREFERRED_SAMPLE_RATE);
        }
        if let cpal::SupportedBufferSize::Range { min, max } = supported.buffer_size() {
            if (*min..=*max).contains(&PREFERRED_BUFFER_FRAMES) {
                config.buffer_size = cpal::BufferSize::Fixed(PREFERRED_BUFFER_FRAMES);
            }
        }

        let root: Arc<Mutex<Option<SharedSource>>> = Arc::new(Mutex::new(None));
        let stream = match sample_format {
            cpal::SampleFormat::I16 => build_stream_i16(&device, &config, Arc::clone(&root))?,
            cpal::SampleFormat::F32 => build_stream_f32(&device, &config, Arc::clone(&root))?,
            other => return Err(Error::UnsupportedFormat(format!("{other:?}"))),
        };
        stream.play()?;

        let channels = config.channels as usize;
        let sample_rate = f64::from(config.sample_rate.0);
        info!(
            "{} output at {} kHz",
            layout_name(channels),
            sample_rate / 1000.0
        );

        Ok(Self {
            root,
            sample_rate,
            channels,
            stream: Some(StreamHandle(stream)),
        })
    }

    /// Bind the root source the callback pulls from.
    pub fn bind(&self, source: SharedSource) {
        let mut root = self.root.lock();
        debug_assert!(root.is_none(), "output already bound");
        *root = Some(source);
    }

    /// Take the bridge lock. Graph mutations that must become visible to the
    /// callback happen under this guard; dropping the guard releases it.
    pub fn lock(&self) -> MutexGuard<'_, Option<SharedSource>> {
        self.root.lock()
    }

    /// Non-blocking variant of [`lock`](Self::lock).
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Option<SharedSource>>> {
        self.root.try_lock()
    }

    /// Sample rate granted by the device.
    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Channel count granted by the device.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        if let Some(handle) = self.stream.take() {
            let _ = handle.0.pause();
        }
        DEVICE_IN_USE.store(false, Ordering::SeqCst);
    }
}

fn supports_preferred_rate(
    device: &cpal::Device,
    sample_format: cpal::SampleFormat,
    channels: cpal::ChannelCount,
) -> bool {
    match device.supported_output_configs() {
        Ok(mut configs) => configs.any(|candidate| {
            candidate.sample_format() == sample_format
                && candidate.channels() == channels
                && candidate.min_sample_rate().0 <= PREFERRED_SAMPLE_RATE
                && PREFERRED_SAMPLE_RATE <= candidate.max_sample_rate().0
        }),
        Err(_) => false,
    }
}

/// Render one buffer: pull internal frames from the root, adapt them to the
/// device layout, and write them through `quantize`.
///
/// Runs on the audio thread with the bridge lock held; no allocation.
#[inline]
fn fill_buffer<T: Copy>(
    data: &mut [T],
    root: &Mutex<Option<SharedSource>>,
    channels: usize,
    sample_duration: f64,
    device_frame: &mut [f32],
    quantize: impl Fn(f32) -> T,
) {
    debug_assert_eq!(data.len() % channels, 0);
    let root = root.lock();
    let Some(source) = root.as_ref() else {
        return;
    };
    let mut source = source.lock();
    for frame in data.chunks_exact_mut(channels) {
        let mut internal = [0.0f32; CHANNELS];
        for (channel, sample) in internal.iter_mut().enumerate() {
            *sample = source.current_sample(channel);
        }
        source.advance_time(sample_duration);
        mix_frame(device_frame, &internal);
        for (out, value) in frame.iter_mut().zip(device_frame.iter()) {
            *out = quantize(*value);
        }
    }
}

/// Signed 16-bit quantization: scale by 0x8000, round, saturate.
#[inline]
fn quantize_i16(sample: f32) -> i16 {
    let scaled = (f64::from(sample) * 32768.0).round();
    scaled.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

fn build_stream_i16(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    root: Arc<Mutex<Option<SharedSource>>>,
) -> Result<cpal::Stream> {
    let channels = config.channels as usize;
    let sample_duration = 1.0 / f64::from(config.sample_rate.0);
    let mut device_frame = vec![0.0f32; channels];
    let stream = device.build_output_stream(
        config,
        move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
            data.fill(0);
            fill_buffer(
                data,
                &root,
                channels,
                sample_duration,
                &mut device_frame,
                quantize_i16,
            );
        },
        |_err| {
            // Stream error; cannot log from the audio thread.
        },
        None,
    )?;
    Ok(stream)
}

fn build_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    root: Arc<Mutex<Option<SharedSource>>>,
) -> Result<cpal::Stream> {
    let channels = config.channels as usize;
    let sample_duration = 1.0 / f64::from(config.sample_rate.0);
    let mut device_frame = vec![0.0f32; channels];
    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            data.fill(0.0);
            fill_buffer(
                data,
                &root,
                channels,
                sample_duration,
                &mut device_frame,
                |sample| sample,
            );
        },
        |_err| {
            // Stream error; cannot log from the audio thread.
        },
        None,
    )?;
    Ok(stream)
}

fn layout_name(channels: usize) -> Cow<'static, str> {
    match channels {
        1 => "mono".into(),
        2 => "stereo".into(),
        3 => "triphonic".into(),
        4 => "quadraphonic".into(),
        5 => "pentaphonic".into(),
        6 => "5.1 surround".into(),
        7 => "6.1 surround".into(),
        8 => "7.1 surround".into(),
        other => format!("{other}-channel").into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_scales_and_saturates() {
        assert_eq!(quantize_i16(0.0), 0);
        assert_eq!(quantize_i16(0.5), 16384);
        assert_eq!(quantize_i16(-1.0), i16::MIN);
        assert_eq!(quantize_i16(1.0), i16::MAX);
        assert_eq!(quantize_i16(4.0), i16::MAX);
        assert_eq!(quantize_i16(-4.0), i16::MIN);
    }

    #[test]
    fn test_fill_buffer_renders_the_bound_source() {
        use crate::source::{shared, Sine};

        let root = Mutex::new(Some(shared(Sine::new(440.0, 0.5))));
        let mut data = [0i16; 32];
        let mut device_frame = [0.0f32; 2];
        fill_buffer(
            &mut data,
            &root,
            2,
            1.0 / 44100.0,
            &mut device_frame,
            quantize_i16,
        );
        // Sine starts at phase zero, so the first frame is silent and later
        // frames are not.
        assert_eq!(data[0], 0);
        assert!(data[2..].iter().any(|&sample| sample != 0));
    }

    #[test]
    fn test_fill_buffer_without_a_root_leaves_silence() {
        let root = Mutex::new(None);
        let mut data = [7i16; 8];
        data.fill(0);
        let mut device_frame = [0.0f32; 2];
        fill_buffer(
            &mut data,
            &root,
            2,
            1.0 / 44100.0,
            &mut device_frame,
            quantize_i16,
        );
        assert!(data.iter().all(|&sample| sample == 0));
    }
}
