//! Instrument directory loading.
//!
//! A directory holds `keys.txt`: leading `#` lines are comments, the first
//! real line is the instrument name, and every following non-empty line names
//! a per-key config file. A per-key file starts (after its own comments) with
//! a 15-field header, then pairs of lines - an audio file name and its
//! per-channel gains - until an empty line or the end of the file.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use legato_core::{shared, AudioData, Mix, Pan, Sampled, CHANNELS};

use crate::error::{Error, Result};
use crate::instrument::{GenericMidiInstrument, KeyRange, SelectMidiInstrument};
use crate::key::VoiceParams;

/// Line-oriented reader that tracks positions for error reporting.
struct Reader<'a> {
    lines: Vec<&'a str>,
    index: usize,
    path: &'a Path,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str, path: &'a Path) -> Self {
        Self {
            lines: text.lines().collect(),
            index: 0,
            path,
        }
    }

    /// Skip the comment block at the current position.
    fn skip_comments(&mut self) {
        while self
            .lines
            .get(self.index)
            .map_or(false, |line| line.starts_with('#'))
        {
            self.index += 1;
        }
    }

    fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.get(self.index).copied();
        if line.is_some() {
            self.index += 1;
        }
        line
    }

    fn required(&mut self) -> Result<&'a str> {
        self.next_line().ok_or_else(|| self.error())
    }

    /// A parse error at the line most recently read.
    fn error(&self) -> Error {
        Error::ConfigParse {
            path: self.path.to_path_buf(),
            line: self.index.max(1),
        }
    }
}

fn field<T: FromStr>(fields: &mut std::str::SplitWhitespace<'_>, reader: &Reader<'_>) -> Result<T> {
    fields
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| reader.error())
}

/// Load an instrument from a directory.
///
/// Each per-key file becomes a [`GenericMidiInstrument`] over a mix of panned
/// sample players, registered for its key range on the returned
/// [`SelectMidiInstrument`].
pub fn load_directory(dir: impl AsRef<Path>) -> Result<SelectMidiInstrument> {
    let dir = dir.as_ref();
    let keys_path = dir.join("keys.txt");
    let text = fs::read_to_string(&keys_path)?;
    let mut reader = Reader::new(&text, &keys_path);
    reader.skip_comments();
    let name = reader.required()?.to_owned();

    let mut instrument = SelectMidiInstrument::new(name.clone());
    while let Some(file_name) = reader.next_line() {
        if file_name.is_empty() {
            continue;
        }
        let key_path = dir.join(file_name);
        instrument.add_range(load_key_file(dir, &key_path, &name)?);
        debug!(file = file_name, "loaded key config");
    }
    Ok(instrument)
}

fn load_key_file(dir: &Path, path: &Path, name: &str) -> Result<KeyRange> {
    let text = fs::read_to_string(path)?;
    let mut reader = Reader::new(&text, path);
    reader.skip_comments();

    let header = reader.required()?;
    let mut fields = header.split_whitespace();
    let source_base_key: f64 = field(&mut fields, &reader)?;
    let mut attack_speed: f64 = field(&mut fields, &reader)?;
    let decay_speed: f64 = field(&mut fields, &reader)?;
    let sustain_speed: f64 = field(&mut fields, &reader)?;
    let release_speed: f64 = field(&mut fields, &reader)?;
    let release_speed_variance: f64 = field(&mut fields, &reader)?;
    let slide_speed: f64 = field(&mut fields, &reader)?;
    let aftertouch_speed: f64 = field(&mut fields, &reader)?;
    let attack_amplitude: f32 = field(&mut fields, &reader)?;
    let decay_amplitude: f32 = field(&mut fields, &reader)?;
    let loop_start: usize = field(&mut fields, &reader)?;
    let loop_end: usize = field(&mut fields, &reader)?;
    let loop_decay_amplitude: f32 = field(&mut fields, &reader)?;
    let start_key: i32 = field(&mut fields, &reader)?;
    let end_key: i32 = field(&mut fields, &reader)?;
    if attack_speed < 0.0 {
        attack_speed = VoiceParams::INSTANTANEOUS_ATTACK;
    }

    let mut bus = Mix::new();
    while let Some(audio_file) = reader.next_line() {
        if audio_file.is_empty() {
            break;
        }
        let mut data = AudioData::load(dir.join(audio_file))?;
        if loop_end > 0 {
            data = data.with_loop(loop_start, loop_end, loop_decay_amplitude);
        }

        let gains_line = reader.required()?;
        let mut gain_fields = gains_line.split_whitespace();
        let mut gains = [0.0f32; CHANNELS];
        for gain in &mut gains {
            *gain = field(&mut gain_fields, &reader)?;
        }

        let player = shared(Sampled::new(Arc::new(data)));
        bus.insert(shared(Pan::new(player, gains)), 1.0)?;
    }

    let params = VoiceParams {
        source_base_key,
        attack_speed,
        decay_speed,
        sustain_speed,
        release_speed,
        release_speed_variance,
        slide_speed,
        aftertouch_speed,
        attack_amplitude,
        decay_amplitude,
    };
    let key_instrument = GenericMidiInstrument::new(name, shared(bus), params);
    Ok(KeyRange::new(Arc::new(key_instrument), start_key, end_key))
}
