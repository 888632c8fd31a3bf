//! Voice Activity Detection.
//!
//! ```text
//! Frame → EnergyAnalyzer ─┬─► NoiseFloorCalibrator        (while Calibrating)
//!                         └─► ThresholdModel + VadStateMachine
//!                                       │
//!                                 PauseDetector ──► Transition
//! ```
//!
//! Every stage is synchronous and bounded per tick. The engine owns one of
//! each and drives them from `VadEngine::tick`.

pub mod calibration;
pub mod energy;
pub mod pause;
pub mod state;
pub mod threshold;

use serde::{Deserialize, Serialize};

pub use calibration::NoiseFloorCalibrator;
pub use energy::{EnergyAnalyzer, EnergySample};
pub use pause::{PauseDetector, SilenceEpisode};
pub use state::{SpeechCandidate, Transition, VadStateMachine};
pub use threshold::{ThresholdModel, ThresholdPair};

/// Where the engine currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VadState {
    /// Not started, or stopped.
    #[default]
    Idle,
    /// Collecting the noise-floor bootstrap window.
    Calibrating,
    Silence,
    Speaking,
}

impl VadState {
    pub fn is_speaking(self) -> bool {
        self == VadState::Speaking
    }

    pub fn is_calibrating(self) -> bool {
        self == VadState::Calibrating
    }
}
