//! Plays one octave of a chromatic scale on a sine instrument through the
//! default output device.
//!
//! The sequence runs entirely on the audio thread: each step is an event on
//! the dispatcher that releases the previous note, starts the next one, and
//! schedules its own successor.

use std::io::stdin;
use std::sync::Arc;

use parking_lot::Mutex;

use legato::prelude::*;

fn step(channel: Arc<Mutex<MidiChannel>>, note: i32) -> EventFn {
    Box::new(move |scheduler| {
        if note > MIDDLE_C {
            channel.lock().note_off(note - 1, DEFAULT_VELOCITY);
        }
        if note <= MIDDLE_C + 12 {
            if let Err(error) = channel.lock().note_on(note, DEFAULT_VELOCITY) {
                eprintln!("note {note} rejected: {error}");
                return;
            }
            let next = Arc::clone(&channel);
            scheduler.schedule_event(0.125, step(next, note + 1));
        }
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let params = VoiceParams {
        source_base_key: 69.0,
        attack_speed: 8.0,
        decay_speed: 1.5,
        sustain_speed: 0.4,
        release_speed: 6.0,
        release_speed_variance: 0.5,
        slide_speed: 0.0,
        aftertouch_speed: 0.0,
        attack_amplitude: 0.3,
        decay_amplitude: 0.2,
    };
    let instrument = Arc::new(GenericMidiInstrument::new(
        "sine lead",
        shared(Sine::new(440.0, 1.0)),
        params,
    ));
    let channel = Arc::new(Mutex::new(MidiChannel::new(instrument)));

    let channel_source = Arc::clone(&channel);
    let dispatcher = Arc::new(Mutex::new(EventDispatcher::new(Some(channel_source))));
    dispatcher
        .lock()
        .schedule_event(0.01, step(Arc::clone(&channel), MIDDLE_C));

    let output = AudioOutput::new()?;
    let root = Arc::clone(&dispatcher);
    let root: SharedSource = root;
    output.bind(root);

    println!("Running...");
    println!("Press enter to exit.");
    let mut line = String::new();
    stdin().read_line(&mut line)?;
    Ok(())
}
