//! Adaptive threshold model.
//!
//! ```text
//! silence = floor × silence_margin
//! speech  = silence × hysteresis_ratio      (rise-in, strictly above silence)
//! release = silence × release_ratio         (drop-out while speaking, ≤ speech)
//! ```
//!
//! The floor drifts toward the smoothed level during quiet silence only:
//! `floor' = β·floor + (1-β)·smoothed`, skipped whenever the level is above
//! `floor × adapt_bound` so soft speech is never absorbed.

use serde::{Deserialize, Serialize};

use crate::config::VadConfig;

/// Speech/silence thresholds derived from one noise floor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdPair {
    pub speech: f32,
    pub silence: f32,
    /// Level a `Speaking` state must drop below to return to silence.
    pub release: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdModel {
    silence_margin: f32,
    hysteresis_ratio: f32,
    release_ratio: f32,
    adapt_rate: f32,
    adapt_bound: f32,
    minimum_floor: f32,
}

impl ThresholdModel {
    pub fn from_config(config: &VadConfig) -> Self {
        Self {
            silence_margin: config.silence_margin,
            hysteresis_ratio: config.hysteresis_ratio,
            release_ratio: config.release_ratio,
            adapt_rate: config.adapt_rate,
            adapt_bound: config.adapt_bound,
            minimum_floor: config.minimum_noise_floor,
        }
    }

    pub fn derive(&self, noise_floor: f32) -> ThresholdPair {
        let silence = noise_floor * self.silence_margin;
        ThresholdPair {
            speech: silence * self.hysteresis_ratio,
            silence,
            release: silence * self.release_ratio,
        }
    }

    /// Whether `smoothed` is quiet enough to be absorbed into the floor.
    pub fn can_adapt(&self, noise_floor: f32, smoothed: f32) -> bool {
        smoothed < noise_floor * self.adapt_bound
    }

    /// One slow EMA step of the floor toward `smoothed`, when allowed.
    pub fn adapt(&self, noise_floor: f32, smoothed: f32) -> f32 {
        if !self.can_adapt(noise_floor, smoothed) {
            return noise_floor;
        }
        let next = self.adapt_rate * noise_floor + (1.0 - self.adapt_rate) * smoothed;
        next.max(self.minimum_floor)
    }
}
