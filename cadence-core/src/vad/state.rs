//! The VAD state machine.
//!
//! ```text
//!   Idle ──start──► Calibrating ──window elapsed──► Silence ◄──────┐
//!                        ▲                            │            │
//!                        │                 smoothed > speech       │
//!                  recalibrate()           for ≥ min_speech_ms     │
//!                                                     ▼            │
//!                                                  Speaking ──smoothed < release
//! ```
//!
//! One `step` per analysed tick, at most one transition per step. Thresholds
//! are compared against the smoothed energy only, with strict comparisons so
//! a tie never counts as crossing.

use tracing::{debug, info};

use super::{
    calibration::NoiseFloorCalibrator,
    energy::EnergySample,
    pause::PauseDetector,
    threshold::{ThresholdModel, ThresholdPair},
    VadState,
};
use crate::config::{CandidatePolicy, VadConfig};

/// Debounce record for energy above the speech threshold that has not yet
/// lasted `min_speech_duration_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechCandidate {
    pub started_at_ms: u64,
    pub last_above_ms: u64,
}

/// What a single step changed, if anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    CalibrationComplete {
        timestamp_ms: u64,
        noise_floor: f32,
    },
    SpeechStarted {
        timestamp_ms: u64,
        energy: f32,
        prior_silence_ms: u64,
    },
    SpeechEnded {
        timestamp_ms: u64,
        energy: f32,
    },
    PauseDetected {
        timestamp_ms: u64,
        segment_count: u64,
        silence_ms: u64,
        noise_floor: f32,
        effective_threshold: f32,
    },
}

#[derive(Debug, Clone)]
pub struct VadStateMachine {
    state: VadState,
    min_speech_ms: u64,
    calibration_ms: u64,
    policy: CandidatePolicy,
    calibrator: NoiseFloorCalibrator,
    model: ThresholdModel,
    noise_floor: Option<f32>,
    candidate: Option<SpeechCandidate>,
    pause: PauseDetector,
}

impl VadStateMachine {
    pub fn new(config: &VadConfig) -> Self {
        Self {
            state: VadState::Idle,
            min_speech_ms: config.min_speech_duration_ms,
            calibration_ms: config.calibration_duration_ms,
            policy: config.candidate_policy,
            calibrator: NoiseFloorCalibrator::new(
                config.calibration_duration_ms,
                config.calibration_percentile,
                config.minimum_noise_floor,
            ),
            model: ThresholdModel::from_config(config),
            noise_floor: None,
            candidate: None,
            pause: PauseDetector::new(config.pause_duration_ms),
        }
    }

    /// Swap in new tunables. The live floor, state and segment count survive;
    /// thresholds pick the new ratios up on the next step.
    pub fn apply_config(&mut self, config: &VadConfig) {
        self.min_speech_ms = config.min_speech_duration_ms;
        self.calibration_ms = config.calibration_duration_ms;
        self.policy = config.candidate_policy;
        self.calibrator
            .set_params(config.calibration_percentile, config.minimum_noise_floor);
        self.model = ThresholdModel::from_config(config);
        self.pause.set_pause_duration(config.pause_duration_ms);
        if let Some(floor) = self.noise_floor.as_mut() {
            *floor = floor.max(config.minimum_noise_floor);
        }
    }

    /// Enter `Calibrating`, discarding thresholds and ephemeral records.
    /// The window itself opens on the next step.
    pub fn begin_calibration(&mut self) {
        self.state = VadState::Calibrating;
        self.calibrator.reset();
        self.noise_floor = None;
        self.candidate = None;
        self.pause.clear_episode();
    }

    /// Force `Idle`. The segment counter is kept until `reset_segments`.
    pub fn halt(&mut self) {
        self.state = VadState::Idle;
        self.calibrator.reset();
        self.noise_floor = None;
        self.candidate = None;
        self.pause.clear_episode();
    }

    pub fn reset_segments(&mut self) {
        self.pause.reset();
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    pub fn noise_floor(&self) -> Option<f32> {
        self.noise_floor
    }

    /// Current thresholds, derived lazily from the floor. `None` until calibrated.
    pub fn thresholds(&self) -> Option<ThresholdPair> {
        self.noise_floor.map(|floor| self.model.derive(floor))
    }

    /// The threshold that ends the current state from below: the release
    /// level while speaking, the silence level otherwise.
    pub fn effective_threshold(&self) -> Option<f32> {
        self.thresholds().map(|t| match self.state {
            VadState::Speaking => t.release,
            _ => t.silence,
        })
    }

    pub fn candidate(&self) -> Option<&SpeechCandidate> {
        self.candidate.as_ref()
    }

    pub fn segment_count(&self) -> u64 {
        self.pause.segment_count()
    }

    pub fn silence_duration_ms(&self, now_ms: u64) -> u64 {
        self.pause.silence_duration_ms(now_ms)
    }

    pub fn step(&mut self, energy: EnergySample, now_ms: u64) -> Option<Transition> {
        match self.state {
            VadState::Idle => None,
            VadState::Calibrating => self.step_calibrating(energy.raw, now_ms),
            VadState::Silence => self.step_silence(energy.smoothed, now_ms),
            VadState::Speaking => self.step_speaking(energy.smoothed, now_ms),
        }
    }

    fn step_calibrating(&mut self, raw: f32, now_ms: u64) -> Option<Transition> {
        if !self.calibrator.is_started() {
            self.calibrator.start(now_ms, self.calibration_ms);
        }
        self.calibrator.feed(raw);
        if !self.calibrator.is_complete(now_ms) {
            return None;
        }

        let samples = self.calibrator.sample_count();
        let floor = self.calibrator.finish();
        let thresholds = self.model.derive(floor);
        self.noise_floor = Some(floor);
        self.state = VadState::Silence;
        self.pause.open_episode(now_ms, false);
        info!(
            noise_floor = floor,
            speech_threshold = thresholds.speech,
            silence_threshold = thresholds.silence,
            samples,
            "calibration complete"
        );
        Some(Transition::CalibrationComplete {
            timestamp_ms: now_ms,
            noise_floor: floor,
        })
    }

    fn step_silence(&mut self, smoothed: f32, now_ms: u64) -> Option<Transition> {
        let floor = self.noise_floor?;
        let thresholds = self.model.derive(floor);

        if smoothed > thresholds.speech {
            let candidate = self.candidate.get_or_insert_with(|| {
                debug!(at_ms = now_ms, energy = smoothed, "speech candidate opened");
                SpeechCandidate {
                    started_at_ms: now_ms,
                    last_above_ms: now_ms,
                }
            });
            candidate.last_above_ms = now_ms;
            let started_at_ms = candidate.started_at_ms;
            if now_ms.saturating_sub(started_at_ms) < self.min_speech_ms {
                return None;
            }

            self.candidate = None;
            let prior_silence_ms = self
                .pause
                .close_episode()
                .map(|ep| started_at_ms.saturating_sub(ep.started_at_ms))
                .unwrap_or(0);
            self.state = VadState::Speaking;
            info!(
                at_ms = now_ms,
                energy = smoothed,
                prior_silence_ms,
                "speech started"
            );
            return Some(Transition::SpeechStarted {
                timestamp_ms: now_ms,
                energy: smoothed,
                prior_silence_ms,
            });
        }

        if let Some(rejected) = self.candidate.take() {
            debug!(
                held_ms = now_ms.saturating_sub(rejected.started_at_ms),
                "speech candidate rejected"
            );
            if self.policy == CandidatePolicy::ResetSilenceClock {
                self.pause.restart_clock(rejected.last_above_ms);
            }
        }

        let floor = self.model.adapt(floor, smoothed);
        self.noise_floor = Some(floor);

        let fired = self.pause.check(now_ms)?;
        let effective_threshold = self.model.derive(floor).silence;
        info!(
            segment = fired.segment_count,
            silence_ms = fired.silence_ms,
            "pause detected"
        );
        Some(Transition::PauseDetected {
            timestamp_ms: now_ms,
            segment_count: fired.segment_count,
            silence_ms: fired.silence_ms,
            noise_floor: floor,
            effective_threshold,
        })
    }

    fn step_speaking(&mut self, smoothed: f32, now_ms: u64) -> Option<Transition> {
        let thresholds = self.thresholds()?;
        if smoothed < thresholds.release {
            self.state = VadState::Silence;
            self.pause.open_episode(now_ms, true);
            debug!(at_ms = now_ms, energy = smoothed, "speech ended");
            return Some(Transition::SpeechEnded {
                timestamp_ms: now_ms,
                energy: smoothed,
            });
        }
        None
    }
}
