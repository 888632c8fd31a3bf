//! # cadence-core
//!
//! Voice activity detection and pause segmentation for live microphone input.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → AudioCapture → SPSC RingBuffer → RingFrameSource
//!                                                     │
//!                                   VadEngine::poll / VadEngine::tick
//!                                                     │
//!                      EnergyAnalyzer → Calibrator | ThresholdModel + StateMachine
//!                                                     │
//!                                               PauseDetector
//!                                                     │
//!                               VadListener (speech start / pause / energy)
//! ```
//!
//! The engine is synchronous and single-owner. It never owns the audio
//! source: capture belongs to the caller, the engine only borrows a shared
//! handle while running.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod config;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod source;
pub mod vad;

// Convenience re-exports for downstream crates
pub use buffering::frame::Frame;
pub use config::{CandidatePolicy, VadConfig, VadConfigPatch};
pub use engine::VadEngine;
pub use error::CadenceError;
pub use ipc::events::{
    EnergyDetails, EnergyUpdateEvent, EngineSnapshot, PauseDetectedEvent, SequencedEvent,
    SpeechStartEvent, VadEvent,
};
pub use ipc::{BroadcastListener, NullListener, VadListener};
pub use source::{FrameSource, SharedFrameSource};
pub use vad::VadState;
