use std::sync::Arc;

use cadence_core::ipc::events::VadEvent;
use cadence_core::source::{share, QueuedFrames};
use cadence_core::{
    BroadcastListener, CandidatePolicy, Frame, VadConfig, VadEngine, VadState,
};
use crossbeam_channel::Receiver;

const STEP_MS: u64 = 50;

/// Drives an engine with constant-level frames on a 50 ms synthetic clock.
struct Harness {
    engine: VadEngine,
    rx: Receiver<VadEvent>,
    now_ms: u64,
}

impl Harness {
    fn new(config: VadConfig) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let engine = VadEngine::start(config, tx).expect("start engine");
        Self {
            engine,
            rx,
            now_ms: 0,
        }
    }

    /// Feed `duration_ms` of frames whose RMS is `level`; returns every event
    /// except energy updates.
    fn feed(&mut self, level: f32, duration_ms: u64) -> Vec<VadEvent> {
        let mut out = Vec::new();
        for _ in 0..duration_ms / STEP_MS {
            self.engine
                .tick(&Frame::constant(level, 800, 16_000), self.now_ms)
                .expect("tick");
            self.now_ms += STEP_MS;
            out.extend(
                self.rx
                    .try_iter()
                    .filter(|e| !matches!(e, VadEvent::EnergyUpdate(_))),
            );
        }
        out
    }

    /// Calibrate on a 0.01 floor: ticks 0..=500 ms, window closes at 500.
    fn calibrate(&mut self) {
        let events = self.feed(0.01, 550);
        assert!(events.is_empty(), "events during calibration: {events:?}");
        assert_eq!(self.engine.state().state, VadState::Silence);
    }
}

fn speech_starts(events: &[VadEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            VadEvent::SpeechStart(s) => Some(s.timestamp_ms),
            _ => None,
        })
        .collect()
}

fn pauses(events: &[VadEvent]) -> Vec<(u64, u64, f64)> {
    events
        .iter()
        .filter_map(|e| match e {
            VadEvent::PauseDetected(p) => {
                Some((p.timestamp_ms, p.segment_count, p.silence_duration_sec))
            }
            _ => None,
        })
        .collect()
}

/// Config with raw == smoothed and a frozen floor, for exact timing checks.
fn exact_config(policy: CandidatePolicy) -> VadConfig {
    VadConfig {
        smoothing_factor: 0.0,
        adapt_rate: 1.0,
        candidate_policy: policy,
        ..VadConfig::default()
    }
}

#[test]
fn quiet_rise_during_debounce_window_does_not_start_speech() {
    let mut h = Harness::new(VadConfig::default());
    let mut events = h.feed(0.01, 500);
    events.extend(h.feed(0.02, 200));

    assert!(speech_starts(&events).is_empty());
    assert_eq!(h.engine.state().state, VadState::Silence);
}

#[test]
fn sustained_speech_starts_once_after_min_duration() {
    let mut h = Harness::new(VadConfig::default());
    h.calibrate();
    assert!((h.engine.state().noise_floor - 0.01).abs() < 1e-6);

    let run_start = h.now_ms;
    let events = h.feed(0.05, 600);
    let starts = speech_starts(&events);
    assert_eq!(starts.len(), 1, "{events:?}");
    let offset = starts[0] - run_start;
    assert!((300..=350).contains(&offset), "speech start at +{offset} ms");
    assert!(h.engine.state().is_speaking);
}

#[test]
fn long_silence_after_speech_fires_one_pause() {
    let mut h = Harness::new(VadConfig::default());
    h.calibrate();
    h.feed(0.05, 600);

    let run_start = h.now_ms;
    let events = h.feed(0.005, 3_500);
    let fired = pauses(&events);
    assert_eq!(fired.len(), 1, "{events:?}");
    let (at, segment, silence_sec) = fired[0];
    assert_eq!(segment, 1);
    assert!((silence_sec - 3.0).abs() < 1e-9);
    // Smoothing delays the drop-out by a few ticks.
    assert!((3_000..=3_250).contains(&(at - run_start)), "pause at +{} ms", at - run_start);
    assert_eq!(h.engine.state().segment_count, 1);
}

#[test]
fn recalibrate_while_speaking_suspends_events_until_new_window() {
    let mut h = Harness::new(VadConfig::default());
    h.calibrate();
    h.feed(0.05, 600);
    assert!(h.engine.state().is_speaking);

    h.engine.recalibrate().expect("recalibrate");
    let snap = h.engine.state();
    assert_eq!(snap.state, VadState::Calibrating);
    assert!(snap.is_calibrating);
    assert_eq!(snap.noise_floor, 0.0);

    // Loud and then quiet inside the new window: nothing may fire.
    let mut during = h.feed(0.05, 250);
    during.extend(h.feed(0.01, 250));
    assert!(during.is_empty(), "{during:?}");
    assert!(h.engine.state().is_calibrating);

    // The tick at +500 ms closes the window.
    let closing = h.feed(0.01, 50);
    assert!(closing.is_empty());
    assert_eq!(h.engine.state().state, VadState::Silence);

    let events = h.feed(0.05, 600);
    assert_eq!(speech_starts(&events).len(), 1);
}

#[test]
fn stop_is_idempotent_and_releases_source_handle_once() {
    let source = share(QueuedFrames::new());
    let (tx, _rx) = crossbeam_channel::unbounded();
    let mut engine =
        VadEngine::start_with_frame_source(Arc::clone(&source), VadConfig::default(), tx)
            .expect("start engine");
    assert_eq!(Arc::strong_count(&source), 2);

    engine.stop();
    assert!(!engine.state().is_running);
    assert_eq!(Arc::strong_count(&source), 1);

    engine.stop();
    assert!(!engine.state().is_running);
    assert_eq!(Arc::strong_count(&source), 1);
    assert_eq!(engine.state().state, VadState::Idle);
}

#[test]
fn identical_inputs_produce_identical_event_streams() {
    fn run() -> Vec<VadEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut engine = VadEngine::start(VadConfig::default(), tx).expect("start");
        let script: [(f32, u64); 6] = [
            (0.01, 550),
            (0.05, 600),
            (0.004, 3_200),
            (0.03, 150),
            (0.06, 900),
            (0.005, 3_500),
        ];
        let mut now = 0;
        for (level, duration) in script {
            for _ in 0..duration / STEP_MS {
                engine
                    .tick(&Frame::constant(level, 800, 16_000), now)
                    .expect("tick");
                now += STEP_MS;
            }
        }
        rx.try_iter().collect()
    }

    let a = run();
    let b = run();
    assert_eq!(a, b);
    assert!(pauses(&a).len() == 2, "expected two segments");
}

#[test]
fn bursts_shorter_than_min_speech_never_start_speech() {
    for ticks in 1..=5u64 {
        let mut h = Harness::new(exact_config(CandidatePolicy::KeepSilenceClock));
        h.calibrate();
        let mut events = h.feed(0.05, ticks * STEP_MS);
        events.extend(h.feed(0.01, 200));
        assert!(speech_starts(&events).is_empty(), "burst of {ticks} ticks");
        assert_eq!(h.engine.state().state, VadState::Silence);
    }

    // Seven ticks span 300 ms between first and last: confirmed.
    let mut h = Harness::new(exact_config(CandidatePolicy::KeepSilenceClock));
    h.calibrate();
    assert_eq!(speech_starts(&h.feed(0.05, 7 * STEP_MS)).len(), 1);
}

#[test]
fn pause_fires_once_no_matter_how_long_silence_lasts() {
    let mut h = Harness::new(exact_config(CandidatePolicy::KeepSilenceClock));
    h.calibrate();
    h.feed(0.05, 600);
    let events = h.feed(0.005, 20_000);
    assert_eq!(pauses(&events).len(), 1);

    // A second utterance opens a second episode.
    h.feed(0.05, 600);
    let events = h.feed(0.005, 4_000);
    let fired = pauses(&events);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].1, 2);
}

#[test]
fn rejected_candidate_and_silence_clock_per_policy() {
    // (policy, pause offset from the drop-out at 1150 ms)
    let cases = [
        (CandidatePolicy::KeepSilenceClock, 3_000),
        // Clock restarts at the last above-threshold tick (2200 ms).
        (CandidatePolicy::ResetSilenceClock, 4_050),
    ];

    for (policy, expected_offset) in cases {
        let mut h = Harness::new(exact_config(policy));
        h.calibrate();
        h.feed(0.05, 600);
        let drop_at = h.now_ms;

        let mut events = h.feed(0.005, 1_000);
        events.extend(h.feed(0.05, 100));
        events.extend(h.feed(0.005, 4_000));

        assert!(speech_starts(&events).is_empty(), "{policy:?}");
        let fired = pauses(&events);
        assert_eq!(fired.len(), 1, "{policy:?}: {events:?}");
        assert_eq!(fired[0].0, drop_at + expected_offset, "{policy:?}");
        assert_eq!(fired[0].1, 1);
    }
}

#[test]
fn noise_floor_stays_within_bounds_while_adapting() {
    let config = VadConfig {
        adapt_rate: 0.9,
        minimum_noise_floor: 0.005,
        ..VadConfig::default()
    };
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut engine = VadEngine::start(config.clone(), tx).expect("start");

    let levels = [0.004_f32, 0.006, 0.008, 0.012, 0.002, 0.0];
    let mut now = 0;
    let mut max_smoothed = 0.0_f32;
    let mut initial_floor = None;
    for i in 0..400 {
        let level = levels[i % levels.len()];
        engine
            .tick(&Frame::constant(level, 800, 16_000), now)
            .expect("tick");
        now += STEP_MS;
        for event in rx.try_iter() {
            if let VadEvent::EnergyUpdate(e) = event {
                max_smoothed = max_smoothed.max(e.smoothed_energy);
            }
        }

        let snap = engine.state();
        if snap.state == VadState::Calibrating {
            continue;
        }
        let floor = snap.noise_floor;
        let initial = *initial_floor.get_or_insert(floor);
        assert!(floor >= config.minimum_noise_floor, "floor {floor} below minimum");
        assert!(
            floor <= initial.max(max_smoothed) + 1e-7,
            "floor {floor} above every observed level"
        );
    }
}

#[tokio::test]
async fn broadcast_listener_delivers_speech_and_pause() {
    let listener = BroadcastListener::new(false);
    let mut rx = listener.subscribe();
    let mut engine = VadEngine::start(exact_config(CandidatePolicy::KeepSilenceClock), listener)
        .expect("start");

    let script: [(f32, u64); 3] = [(0.01, 550), (0.05, 600), (0.005, 3_500)];
    let mut now = 0;
    for (level, duration) in script {
        for _ in 0..duration / STEP_MS {
            engine
                .tick(&Frame::constant(level, 800, 16_000), now)
                .expect("tick");
            now += STEP_MS;
        }
    }

    let first = rx.recv().await.expect("speech start");
    let second = rx.recv().await.expect("pause");
    assert_eq!(first.seq, 0);
    assert!(matches!(first.event, VadEvent::SpeechStart(_)));
    assert_eq!(second.seq, 1);
    assert!(matches!(second.event, VadEvent::PauseDetected(_)));
}
