//! Symphonia-backed decoding into [`AudioData`].

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio_data::AudioData;
use crate::channels::{mix_frame, Frame, CHANNELS};
use crate::error::{Error, Result};

impl AudioData {
    /// Decode an audio file into an unlooped buffer in the internal channel
    /// layout, at the file's own sample rate.
    ///
    /// Ogg/Vorbis is always available; other formats depend on how Symphonia
    /// was built.
    pub fn load(path: impl AsRef<Path>) -> Result<AudioData> {
        let path = path.as_ref();
        decode(path).map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn decode(path: &Path) -> core::result::Result<AudioData, SymphoniaError> {
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|extension| extension.to_str()) {
        hint.with_extension(extension);
    }

    let file = File::open(path).map_err(SymphoniaError::IoError)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());
    let format_opts = FormatOptions {
        enable_gapless: false,
        ..Default::default()
    };
    let probed = symphonia::default::get_probe().format(
        &hint,
        stream,
        &format_opts,
        &MetadataOptions::default(),
    )?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(SymphoniaError::DecodeError("no decodable track"))?;
    let track_id = track.id;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut output: Option<AudioData> = None;
    let mut input_frame: Vec<f32> = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            // The reader signals end of stream through an error; if frames
            // were decoded, the stream simply ended.
            Err(error) => match output {
                Some(data) => return Ok(data),
                None => return Err(error),
            },
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Skip over recoverable corruption.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(error) => return Err(error),
        };

        let spec = *decoded.spec();
        let data = output.get_or_insert_with(|| {
            input_frame.resize(spec.channels.count(), 0.0);
            AudioData::new(Vec::new(), f64::from(spec.rate))
        });

        let mut buffer = AudioBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.render_silence(Some(decoded.frames()));
        convert_to_f32(&decoded, &mut buffer);

        data.frames.reserve(buffer.frames());
        for index in 0..buffer.frames() {
            for (channel, value) in input_frame.iter_mut().enumerate() {
                *value = buffer.chan(channel)[index];
            }
            let mut frame: Frame = [0.0; CHANNELS];
            mix_frame(&mut frame, &input_frame);
            data.frames.push(frame);
        }
    }
}

fn convert_to_f32(decoded: &AudioBufferRef<'_>, dest: &mut AudioBuffer<f32>) {
    match decoded {
        AudioBufferRef::U8(buffer) => buffer.convert(dest),
        AudioBufferRef::U16(buffer) => buffer.convert(dest),
        AudioBufferRef::U24(buffer) => buffer.convert(dest),
        AudioBufferRef::U32(buffer) => buffer.convert(dest),
        AudioBufferRef::S8(buffer) => buffer.convert(dest),
        AudioBufferRef::S16(buffer) => buffer.convert(dest),
        AudioBufferRef::S24(buffer) => buffer.convert(dest),
        AudioBufferRef::S32(buffer) => buffer.convert(dest),
        AudioBufferRef::F32(buffer) => buffer.convert(dest),
        AudioBufferRef::F64(buffer) => buffer.convert(dest),
    }
}
