//! End-to-end scenarios for the source graph.

use std::f64::consts::TAU;
use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use parking_lot::Mutex;

use legato::prelude::*;
use legato::{NodeId, SlotId};

const SAMPLE_RATE: f64 = 44100.0;

/// Records the total simulated time delivered to it.
struct TimeProbe {
    id: NodeId,
    elapsed: f64,
}

impl TimeProbe {
    fn new() -> Arc<Mutex<TimeProbe>> {
        Arc::new(Mutex::new(TimeProbe {
            id: NodeId::fresh(),
            elapsed: 0.0,
        }))
    }
}

impl AudioSource for TimeProbe {
    fn current_sample(&self, _channel: usize) -> f32 {
        0.0
    }
    fn advance_time(&mut self, delta_time: f64) {
        self.elapsed += delta_time;
    }
    fn duplicate(&self) -> legato::core::Result<SharedSource> {
        Ok(shared(TimeProbe {
            id: NodeId::fresh(),
            elapsed: self.elapsed,
        }))
    }
    fn id(&self) -> NodeId {
        self.id
    }
}

/// Renders `frames` stereo frames from `source` at the device cadence, the
/// way the output bridge pulls them.
fn render(source: &SharedSource, frames: usize) -> Vec<Frame> {
    let mut output = Vec::with_capacity(frames);
    let mut source = source.lock();
    for _ in 0..frames {
        let mut frame = [0.0f32; CHANNELS];
        for (channel, sample) in frame.iter_mut().enumerate() {
            *sample = source.current_sample(channel);
        }
        source.advance_time(1.0 / SAMPLE_RATE);
        output.push(frame);
    }
    output
}

#[test]
fn sine_matches_the_closed_form() {
    let mut sine = Sine::new(440.0, 1.0);
    for k in 1..=5 {
        sine.advance_time(1.0 / SAMPLE_RATE);
        let expected = (TAU * 440.0 * f64::from(k) / SAMPLE_RATE).sin();
        assert_abs_diff_eq!(f64::from(sine.current_sample(0)), expected, epsilon = 1e-6);
    }
}

#[test]
fn time_scale_linear_ramp_delivers_the_exact_integral() {
    let probe = TimeProbe::new();
    let probe_source = Arc::clone(&probe);
    let mut scaler = TimeScale::new(probe_source, 1.0);
    scaler.set_scale(3.0, 1.0, Ramp::Linear);
    scaler.advance_time(2.0);
    assert_relative_eq!(scaler.scale(), 3.0);
    assert_abs_diff_eq!(probe.lock().elapsed, 4.0, epsilon = 1e-12);
}

#[test]
fn amplify_soft_log_ramp_stays_finite_and_monotone() {
    let mut amplify = Amplify::new(shared(Silence::new()), 0.0);
    amplify.set_amplitude(1.0, 1e-6, Ramp::Exponential);
    let mut previous = 0.0;
    for _ in 0..1000 {
        amplify.advance_time(0.001);
        let amplitude = amplify.amplitude();
        assert!(amplitude.is_finite());
        assert!(amplitude >= previous && amplitude <= 1.0);
        previous = amplitude;
    }
}

#[test]
fn dispatcher_fires_simultaneous_events_in_insertion_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let tag = |tag: &'static str| -> EventFn {
        let order = Arc::clone(&order);
        Box::new(move |scheduler| {
            order.lock().push((tag, scheduler.current_time()));
        })
    };
    let mut dispatcher = EventDispatcher::new(None);
    dispatcher.schedule_event(0.0, tag("a"));
    dispatcher.schedule_event(0.0, tag("b"));
    dispatcher.advance_time(0.1);
    assert_eq!(*order.lock(), vec![("a", 0.0), ("b", 0.0)]);
    assert_eq!(dispatcher.current_time(), 0.1);
}

#[test]
fn stereo_to_mono_downmix_cancels_opposite_phases() {
    let mut mono = [1.0f32];
    mix_frame(&mut mono, &[1.0, -1.0]);
    assert_relative_eq!(mono[0], 0.0);
}

#[test]
fn sources_are_pure_between_advances() {
    let sources: Vec<SharedSource> = vec![
        shared(Sine::new(440.0, 1.0)),
        shared(Triangle::new(220.0, 0.5)),
        shared(Silence::new()),
    ];
    for source in sources {
        source.lock().advance_time(0.0017);
        let first = source.lock().current_sample(0);
        for _ in 0..5 {
            assert_eq!(source.lock().current_sample(0), first);
        }
    }
}

#[test]
fn mix_and_modulate_identities() {
    let mix = Mix::new();
    assert_eq!(mix.current_sample(0), 0.0);
    let modulate = Modulate::new();
    assert_eq!(modulate.current_sample(0), 1.0);
}

#[test]
fn a_mixed_graph_renders_the_sum_of_its_parts() {
    let mut mix = Mix::new();
    mix.insert(shared(Sine::new(440.0, 0.5)), 1.0).unwrap();
    mix.insert(shared(Sine::new(440.0, 0.5)), -1.0).unwrap();
    let root: SharedSource = shared(mix);
    for frame in render(&root, 64) {
        assert_abs_diff_eq!(frame[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(frame[1], 0.0, epsilon = 1e-6);
    }
}

#[test]
fn panned_voices_keep_their_channel_weights() {
    let pan = Pan::new(shared(Triangle::new(100.0, 1.0)), [1.0, 0.0]);
    let root: SharedSource = shared(pan);
    let frames = render(&root, 441);
    assert!(frames.iter().any(|frame| frame[0].abs() > 0.1));
    assert!(frames.iter().all(|frame| frame[1] == 0.0));
}

#[test]
fn dispatcher_drives_a_timed_mix_mutation() {
    // Schedule a sine insertion 10 ms in; the graph is silent before and
    // sounding after.
    let mix = Arc::new(Mutex::new(Mix::new()));
    let mix_source = Arc::clone(&mix);
    let dispatcher = Arc::new(Mutex::new(EventDispatcher::new(Some(mix_source))));
    {
        let mix = Arc::clone(&mix);
        dispatcher.lock().schedule_event(
            0.010,
            Box::new(move |_| {
                mix.lock().insert(shared(Sine::new(440.0, 1.0)), 1.0).unwrap();
            }),
        );
    }
    let root = Arc::clone(&dispatcher);
    let root: SharedSource = root;
    let frames = render(&root, 2205); // 50 ms
    let before: &[Frame] = &frames[..440];
    let after: &[Frame] = &frames[442..];
    assert!(before.iter().all(|frame| frame[0] == 0.0));
    assert!(after.iter().any(|frame| frame[0].abs() > 0.1));
}

#[test]
fn duplicated_subgraphs_are_independent() {
    let mut mix = Mix::new();
    let slot: SlotId = mix.insert(shared(Sine::new(440.0, 1.0)), 0.5).unwrap();
    let copy = mix.duplicate().unwrap();
    mix.remove(slot);
    assert_eq!(mix.current_sample(0), 0.0);
    copy.lock().advance_time(0.0006);
    assert!(copy.lock().current_sample(0).abs() > 0.1);
}

#[test]
fn dispatchers_refuse_duplication() {
    let dispatcher = EventDispatcher::new(Some(shared(Silence::new())));
    assert!(dispatcher.duplicate().is_err());

    // And so does any graph that contains one.
    let mut mix = Mix::new();
    mix.insert(shared(EventDispatcher::new(None)), 1.0).unwrap();
    assert!(mix.duplicate().is_err());
}
