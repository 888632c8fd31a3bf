//! `VadEngine`, the top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! VadEngine::start(config, listener)          → state = Calibrating
//!     └─► tick(frame, now_ms) / poll(now_ms)  → Calibrating → Silence ⇄ Speaking
//!         ├─► recalibrate()                   → Calibrating (floor discarded)
//!         └─► stop()                          → Idle, source handle dropped
//!             └─► restart()                   → Calibrating, segment count reset
//! ```
//!
//! `stop()` is idempotent. Every other operation on a stopped engine returns
//! `CadenceError::NotRunning` rather than panicking.
//!
//! ## Threading
//!
//! The engine never spawns threads and never blocks. It is driven by whoever
//! owns it (an audio callback, a timer, a replay loop) and must be ticked from
//! one place at a time; `&mut self` on every mutating call enforces that.

use tracing::{debug, info, warn};

use crate::{
    buffering::frame::Frame,
    config::{VadConfig, VadConfigPatch},
    error::{CadenceError, Result},
    ipc::{
        events::{
            EnergyDetails, EnergyUpdateEvent, EngineSnapshot, PauseDetectedEvent,
            SpeechStartEvent,
        },
        VadListener,
    },
    source::SharedFrameSource,
    vad::{EnergyAnalyzer, EnergySample, Transition, VadStateMachine},
};

/// The voice activity / pause segmentation engine.
pub struct VadEngine {
    config: VadConfig,
    running: bool,
    analyzer: EnergyAnalyzer,
    machine: VadStateMachine,
    listener: Box<dyn VadListener>,
    /// Engine's clone of a caller-owned source. Dropped on `stop()`.
    source: Option<SharedFrameSource>,
    /// Timestamp of the last analysed tick, for the interval gate.
    last_analysis_ms: Option<u64>,
    /// Last timestamp seen by `tick`, analysed or not.
    last_tick_ms: Option<u64>,
}

impl VadEngine {
    /// Validate `config` and start a new engine in `Calibrating`.
    ///
    /// # Errors
    /// `CadenceError::Configuration` if the config is invalid.
    pub fn start(config: VadConfig, listener: impl VadListener + 'static) -> Result<Self> {
        config.validate()?;
        let mut engine = Self {
            analyzer: EnergyAnalyzer::new(config.smoothing_factor),
            machine: VadStateMachine::new(&config),
            config,
            running: false,
            listener: Box::new(listener),
            source: None,
            last_analysis_ms: None,
            last_tick_ms: None,
        };
        engine.begin();
        Ok(engine)
    }

    /// Like `start`, pulling frames from `source` on every `poll`.
    pub fn start_with_frame_source(
        source: SharedFrameSource,
        config: VadConfig,
        listener: impl VadListener + 'static,
    ) -> Result<Self> {
        let mut engine = Self::start(config, listener)?;
        engine.source = Some(source);
        Ok(engine)
    }

    /// Advance the pipeline by one frame.
    ///
    /// Ticks closer than `analysis_interval_ms` to the last analysed tick are
    /// no-ops. Events are delivered to the listener before this returns.
    ///
    /// # Errors
    /// - `NotRunning` after `stop()`.
    /// - `InvalidInput` for an empty, wrongly sized or non-finite frame, or a
    ///   timestamp earlier than the previous tick. Nothing is mutated.
    pub fn tick(&mut self, frame: &Frame, now_ms: u64) -> Result<()> {
        self.ensure_running()?;
        frame.validate(self.config.frame_size)?;
        if let Some(last) = self.last_tick_ms {
            if now_ms < last {
                return Err(CadenceError::input(format!(
                    "timestamp went backwards: {now_ms} < {last}"
                )));
            }
        }
        self.last_tick_ms = Some(now_ms);

        if let Some(last) = self.last_analysis_ms {
            if now_ms - last < self.config.analysis_interval_ms {
                return Ok(());
            }
        }
        self.last_analysis_ms = Some(now_ms);

        let energy = self.analyzer.analyze(frame)?;
        if let Some(transition) = self.machine.step(energy, now_ms) {
            self.dispatch(transition);
        }
        self.emit_energy(energy, now_ms);
        Ok(())
    }

    /// Drain every ready frame from the attached source, ticking each at
    /// `now_ms`. Returns how many frames were consumed.
    ///
    /// With the default interval gate only the first of several backlogged
    /// frames is analysed; the rest are consumed as no-ops.
    pub fn poll(&mut self, now_ms: u64) -> Result<usize> {
        self.ensure_running()?;
        let Some(source) = self.source.clone() else {
            return Ok(0);
        };
        let mut consumed = 0;
        loop {
            // Release the source lock before ticking so a listener can touch it.
            let next = source.lock().next_frame();
            let Some(frame) = next else { break };
            consumed += 1;
            match self.tick(&frame, now_ms) {
                Ok(()) => {}
                Err(CadenceError::InvalidInput(reason)) => {
                    warn!(%reason, "dropping invalid frame from source");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(consumed)
    }

    /// Hand the engine a (new) source, e.g. after a device change.
    pub fn attach_source(&mut self, source: SharedFrameSource) {
        self.source = Some(source);
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Stop analysis. Safe in any state and idempotent.
    ///
    /// Drops the engine's handle to the frame source; the source itself keeps
    /// running for its owner.
    pub fn stop(&mut self) {
        if !self.running {
            debug!("stop on idle engine ignored");
            return;
        }
        self.running = false;
        self.machine.halt();
        self.source = None;
        self.last_analysis_ms = None;
        self.last_tick_ms = None;
        info!(segments = self.machine.segment_count(), "engine stopped");
    }

    /// Start a stopped engine again: fresh calibration, segment count reset.
    ///
    /// # Errors
    /// `CadenceError::AlreadyRunning` if the engine is running.
    pub fn restart(&mut self) -> Result<()> {
        if self.running {
            return Err(CadenceError::AlreadyRunning);
        }
        self.machine.reset_segments();
        self.begin();
        Ok(())
    }

    /// Throw away the noise floor and thresholds and calibrate again.
    /// Takes effect on the next tick.
    pub fn recalibrate(&mut self) -> Result<()> {
        self.ensure_running()?;
        info!(from = ?self.machine.state(), "recalibration requested");
        self.machine.begin_calibration();
        Ok(())
    }

    /// Merge `patch` onto the current config. Applied as a whole or not at all.
    ///
    /// # Errors
    /// `NotRunning` after `stop()`; `Configuration` if the merged config is
    /// invalid, in which case the previous config stays in force.
    pub fn update_config(&mut self, patch: &VadConfigPatch) -> Result<()> {
        self.ensure_running()?;
        let next = self.config.merged(patch)?;
        self.analyzer.set_smoothing(next.smoothing_factor);
        self.machine.apply_config(&next);
        debug!(?patch, "config updated");
        self.config = next;
        Ok(())
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Point-in-time snapshot. Callable in any state.
    pub fn state(&self) -> EngineSnapshot {
        let state = self.machine.state();
        let thresholds = self.machine.thresholds().unwrap_or_default();
        EngineSnapshot {
            is_running: self.running,
            state,
            noise_floor: self.machine.noise_floor().unwrap_or(0.0),
            effective_threshold: self.machine.effective_threshold().unwrap_or(0.0),
            speech_threshold: thresholds.speech,
            smoothed_energy: self.analyzer.smoothed(),
            segment_count: self.machine.segment_count(),
            is_calibrating: state.is_calibrating(),
            is_speaking: state.is_speaking(),
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn begin(&mut self) {
        self.running = true;
        self.analyzer.reset();
        self.last_analysis_ms = None;
        self.last_tick_ms = None;
        self.machine.begin_calibration();
        info!(
            calibration_ms = self.config.calibration_duration_ms,
            pause_ms = self.config.pause_duration_ms,
            "engine started, calibrating"
        );
    }

    fn ensure_running(&self) -> Result<()> {
        if self.running {
            Ok(())
        } else {
            Err(CadenceError::NotRunning)
        }
    }

    fn dispatch(&mut self, transition: Transition) {
        match transition {
            Transition::SpeechStarted {
                timestamp_ms,
                energy,
                prior_silence_ms,
            } => self.listener.on_speech_start(&SpeechStartEvent {
                timestamp_ms,
                energy,
                prior_silence_duration_sec: ms_to_sec(prior_silence_ms),
            }),
            Transition::PauseDetected {
                timestamp_ms,
                segment_count,
                silence_ms,
                noise_floor,
                effective_threshold,
            } => self.listener.on_pause_detected(&PauseDetectedEvent {
                segment_count,
                silence_duration_sec: ms_to_sec(silence_ms),
                timestamp_ms,
                noise_floor,
                effective_threshold,
            }),
            Transition::CalibrationComplete {
                timestamp_ms,
                noise_floor,
            } => debug!(at_ms = timestamp_ms, noise_floor, "listening for speech"),
            Transition::SpeechEnded {
                timestamp_ms,
                energy,
            } => debug!(at_ms = timestamp_ms, energy, "listening for pause"),
        }
    }

    fn emit_energy(&mut self, energy: EnergySample, now_ms: u64) {
        let state = self.machine.state();
        let thresholds = self.machine.thresholds().unwrap_or_default();
        self.listener.on_energy_update(&EnergyUpdateEvent {
            timestamp_ms: now_ms,
            smoothed_energy: energy.smoothed,
            is_speaking: state.is_speaking(),
            details: EnergyDetails {
                raw_energy: energy.raw,
                threshold: self.machine.effective_threshold().unwrap_or(0.0),
                speech_threshold: thresholds.speech,
                noise_floor: self.machine.noise_floor().unwrap_or(0.0),
                state,
            },
        });
    }
}

fn ms_to_sec(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
