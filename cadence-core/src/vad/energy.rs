//! Energy analyzer: per-frame RMS plus an exponentially smoothed level.
//!
//! ## Algorithm
//!
//! 1. `raw = sqrt(mean(sample²))` over the whole frame.
//! 2. `smoothed = α·smoothed_prev + (1-α)·raw`; the first frame seeds
//!    `smoothed = raw` so the level does not ramp up from zero.
//!
//! Higher α means more inertia. All threshold decisions downstream read the
//! smoothed value so a single loud frame cannot flip the state machine.

use serde::{Deserialize, Serialize};

use crate::buffering::frame::Frame;
use crate::error::Result;

/// RMS of one frame and its smoothed counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergySample {
    pub raw: f32,
    pub smoothed: f32,
}

#[derive(Debug, Clone)]
pub struct EnergyAnalyzer {
    /// Weight of the previous smoothed value, in [0, 1).
    smoothing: f32,
    smoothed: Option<f32>,
}

impl EnergyAnalyzer {
    pub fn new(smoothing: f32) -> Self {
        Self {
            smoothing,
            smoothed: None,
        }
    }

    /// Score one frame. Call once per frame, in capture order.
    ///
    /// # Errors
    /// `InvalidInput` for empty frames or non-finite samples; the smoothed
    /// level is left untouched in that case.
    pub fn analyze(&mut self, frame: &Frame) -> Result<EnergySample> {
        frame.validate(None)?;
        let raw = rms(frame.samples());
        let smoothed = match self.smoothed {
            Some(prev) => self.smoothing * prev + (1.0 - self.smoothing) * raw,
            None => raw,
        };
        self.smoothed = Some(smoothed);
        Ok(EnergySample { raw, smoothed })
    }

    /// Last smoothed level, 0 before the first frame.
    pub fn smoothed(&self) -> f32 {
        self.smoothed.unwrap_or(0.0)
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = smoothing;
    }

    pub fn reset(&mut self) {
        self.smoothed = None;
    }
}

/// Compute the root-mean-square of a sample slice.
///
/// Accumulates in f64 so long frames of tiny samples keep their precision.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}
