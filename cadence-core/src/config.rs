//! Engine configuration.
//!
//! All tunables of the engine live here; there are no hard-coded variants.
//! `VadConfig` is validated once at construction (and again on every
//! `update_config`) so nothing downstream has to re-check ranges mid-stream.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CadenceError, Result};

/// How a speech candidate that fails the debounce affects the silence clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CandidatePolicy {
    /// Rejected candidates leave the running silence episode untouched.
    #[default]
    KeepSilenceClock,
    /// Any tick above the speech threshold restarts the silence clock,
    /// even if the candidate is later rejected.
    ResetSilenceClock,
}

/// Configuration for `VadEngine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct VadConfig {
    /// Continuous silence after speech before a pause fires. Default: 3000.
    pub pause_duration_ms: u64,
    /// Debounce: energy must stay above the speech threshold this long.
    /// Default: 300.
    pub min_speech_duration_ms: u64,
    /// Length of the noise-floor bootstrap window. Default: 500.
    pub calibration_duration_ms: u64,
    /// Silence threshold = floor × margin. Default: 1.0.
    pub silence_margin: f32,
    /// Speech threshold = silence threshold × ratio. Must be > 1. Default: 1.3.
    pub hysteresis_ratio: f32,
    /// Speaking-side drop-out threshold = silence threshold × ratio.
    /// Must lie in `[1, hysteresis_ratio]`. Default: 1.0.
    pub release_ratio: f32,
    /// EMA weight of the previous smoothed value, in `[0, 1)`. Default: 0.5.
    pub smoothing_factor: f32,
    /// Minimum spacing between analysed ticks. Default: 50.
    pub analysis_interval_ms: u64,
    /// Lower bound for the noise floor. Default: 0.005.
    pub minimum_noise_floor: f32,
    /// Percentile of calibration energies used as the floor. Default: 0.5.
    pub calibration_percentile: f32,
    /// Floor adaptation weight (β). Close to 1 means slow drift. Default: 0.997.
    pub adapt_rate: f32,
    /// Only energies below floor × bound are absorbed into the floor. Default: 1.5.
    pub adapt_bound: f32,
    /// Expected samples per frame. `None` accepts any non-empty frame.
    pub frame_size: Option<usize>,
    pub candidate_policy: CandidatePolicy,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            pause_duration_ms: 3_000,
            min_speech_duration_ms: 300,
            calibration_duration_ms: 500,
            silence_margin: 1.0,
            hysteresis_ratio: 1.3,
            release_ratio: 1.0,
            smoothing_factor: 0.5,
            analysis_interval_ms: 50,
            minimum_noise_floor: 0.005,
            calibration_percentile: 0.5,
            adapt_rate: 0.997,
            adapt_bound: 1.5,
            frame_size: None,
            candidate_policy: CandidatePolicy::KeepSilenceClock,
        }
    }
}

impl VadConfig {
    /// Parse a JSON document (camelCase keys, missing keys take defaults)
    /// and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: VadConfig = serde_json::from_str(json)
            .map_err(|e| CadenceError::config(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Check every range and cross-field constraint.
    ///
    /// # Errors
    /// `CadenceError::Configuration` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.pause_duration_ms == 0 {
            return Err(CadenceError::config("pauseDurationMs must be > 0"));
        }
        if self.calibration_duration_ms == 0 {
            return Err(CadenceError::config("calibrationDurationMs must be > 0"));
        }
        require_finite("silenceMargin", self.silence_margin)?;
        require_finite("hysteresisRatio", self.hysteresis_ratio)?;
        require_finite("releaseRatio", self.release_ratio)?;
        require_finite("smoothingFactor", self.smoothing_factor)?;
        require_finite("minimumNoiseFloor", self.minimum_noise_floor)?;
        require_finite("calibrationPercentile", self.calibration_percentile)?;
        require_finite("adaptRate", self.adapt_rate)?;
        require_finite("adaptBound", self.adapt_bound)?;

        if self.silence_margin <= 0.0 {
            return Err(CadenceError::config("silenceMargin must be > 0"));
        }
        // speech = silence × ratio, so ratio ≤ 1 would collapse the hysteresis band.
        if self.hysteresis_ratio <= 1.0 {
            return Err(CadenceError::config(format!(
                "hysteresisRatio must be > 1 (got {}): speech threshold must exceed silence threshold",
                self.hysteresis_ratio
            )));
        }
        if self.release_ratio < 1.0 || self.release_ratio > self.hysteresis_ratio {
            return Err(CadenceError::config(format!(
                "releaseRatio must lie in [1, hysteresisRatio={}] (got {})",
                self.hysteresis_ratio, self.release_ratio
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing_factor) {
            return Err(CadenceError::config("smoothingFactor must lie in [0, 1)"));
        }
        if self.minimum_noise_floor <= 0.0 {
            return Err(CadenceError::config("minimumNoiseFloor must be > 0"));
        }
        // The thresholds derived from the smallest floor must stay representable,
        // otherwise speech and silence collapse to the same 0 or inf.
        let silence = self.minimum_noise_floor * self.silence_margin;
        if !silence.is_normal() {
            return Err(CadenceError::config(format!(
                "minimumNoiseFloor × silenceMargin = {silence} is not a usable threshold"
            )));
        }
        let speech = silence * self.hysteresis_ratio;
        if !speech.is_finite() || speech <= silence {
            return Err(CadenceError::config(format!(
                "speech threshold {speech} does not exceed silence threshold {silence}"
            )));
        }
        if !(0.0..=1.0).contains(&self.calibration_percentile) {
            return Err(CadenceError::config(
                "calibrationPercentile must lie in [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.adapt_rate) {
            return Err(CadenceError::config("adaptRate must lie in [0, 1]"));
        }
        if self.adapt_bound < 1.0 {
            return Err(CadenceError::config("adaptBound must be >= 1"));
        }
        if self.frame_size == Some(0) {
            return Err(CadenceError::config("frameSize must be > 0 when set"));
        }
        Ok(())
    }

    /// Return a copy with `patch` applied, validated as a whole.
    pub fn merged(&self, patch: &VadConfigPatch) -> Result<Self> {
        let mut next = self.clone();
        patch.apply_to(&mut next);
        next.validate()?;
        Ok(next)
    }
}

fn require_finite(field: &str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CadenceError::config(format!("{field} must be finite")))
    }
}

/// Partial configuration for `VadEngine::update_config`.
///
/// `None` fields keep their current value. `frame_size` is doubly optional:
/// `Some(None)` clears the expected frame size, written `"frameSize": null`
/// in JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct VadConfigPatch {
    pub pause_duration_ms: Option<u64>,
    pub min_speech_duration_ms: Option<u64>,
    pub calibration_duration_ms: Option<u64>,
    pub silence_margin: Option<f32>,
    pub hysteresis_ratio: Option<f32>,
    pub release_ratio: Option<f32>,
    pub smoothing_factor: Option<f32>,
    pub analysis_interval_ms: Option<u64>,
    pub minimum_noise_floor: Option<f32>,
    pub calibration_percentile: Option<f32>,
    pub adapt_rate: Option<f32>,
    pub adapt_bound: Option<f32>,
    #[serde(
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub frame_size: Option<Option<usize>>,
    pub candidate_policy: Option<CandidatePolicy>,
}

/// A key that is present maps to `Some`, even when its value is `null`.
/// Absent keys fall back to `None` through `#[serde(default)]`.
fn present_or_null<'de, D, T>(
    deserializer: D,
) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl VadConfigPatch {
    fn apply_to(&self, cfg: &mut VadConfig) {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field { cfg.$field = v; })*
            };
        }
        set!(
            pause_duration_ms,
            min_speech_duration_ms,
            calibration_duration_ms,
            silence_margin,
            hysteresis_ratio,
            release_ratio,
            smoothing_factor,
            analysis_interval_ms,
            minimum_noise_floor,
            calibration_percentile,
            adapt_rate,
            adapt_bound,
            frame_size,
            candidate_policy,
        );
    }
}
