//! Noise floor calibration over a bootstrap window.
//!
//! Raw energies are collected until `window_ms` of caller time has passed
//! (timestamps, not sample counts, since frame cadence may jitter). The floor
//! is a nearest-rank percentile of the collected window, never below the
//! configured minimum.

#[derive(Debug, Clone)]
pub struct NoiseFloorCalibrator {
    window_ms: u64,
    percentile: f32,
    minimum_floor: f32,
    started_at_ms: Option<u64>,
    samples: Vec<f32>,
}

impl NoiseFloorCalibrator {
    pub fn new(window_ms: u64, percentile: f32, minimum_floor: f32) -> Self {
        Self {
            window_ms,
            percentile,
            minimum_floor,
            started_at_ms: None,
            samples: Vec::new(),
        }
    }

    /// Open a fresh window at `now_ms`, discarding anything collected so far.
    pub fn start(&mut self, now_ms: u64, window_ms: u64) {
        self.window_ms = window_ms;
        self.started_at_ms = Some(now_ms);
        self.samples.clear();
    }

    pub fn is_started(&self) -> bool {
        self.started_at_ms.is_some()
    }

    pub fn feed(&mut self, raw_energy: f32) {
        self.samples.push(raw_energy);
    }

    /// Whether the window has elapsed at `now_ms`. Always false before `start`.
    pub fn is_complete(&self, now_ms: u64) -> bool {
        self.started_at_ms
            .map(|t| now_ms.saturating_sub(t) >= self.window_ms)
            .unwrap_or(false)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Consume the window and return the noise floor.
    ///
    /// With no samples the floor is the configured minimum.
    pub fn finish(&mut self) -> f32 {
        let floor = percentile(&mut self.samples, self.percentile)
            .map(|candidate| candidate.max(self.minimum_floor))
            .unwrap_or(self.minimum_floor);
        self.samples.clear();
        self.started_at_ms = None;
        floor
    }

    /// Drop any in-progress window without producing a floor.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.started_at_ms = None;
    }

    pub fn set_params(&mut self, percentile: f32, minimum_floor: f32) {
        self.percentile = percentile;
        self.minimum_floor = minimum_floor;
    }
}

/// Nearest-rank percentile: sorts in place, picks `round(p·(n-1))`.
fn percentile(values: &mut [f32], p: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let idx = ((values.len() - 1) as f32 * p.clamp(0.0, 1.0)).round() as usize;
    values.get(idx.min(values.len() - 1)).copied()
}
