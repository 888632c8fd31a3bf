//! Typed analysis frame handed to the engine once per tick.

use std::sync::Arc;

use crate::error::{CadenceError, Result};

/// An immutable block of mono PCM samples at a known sample rate.
///
/// Samples are shared behind an `Arc` so a frame can be cloned into a
/// queue or a test fixture without copying audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl Frame {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// A frame of `len` identical samples. Handy for synthetic signals:
    /// the RMS of a constant frame is `|amplitude|`.
    pub fn constant(amplitude: f32, len: usize, sample_rate: u32) -> Self {
        Self::new(vec![amplitude; len], sample_rate)
    }

    /// Mono f32 samples in [-1.0, 1.0].
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of this frame in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Reject frames the analyzer cannot score.
    ///
    /// # Errors
    /// `CadenceError::InvalidInput` for an empty frame, a length other than
    /// `expected_len`, or any NaN/infinite sample.
    pub fn validate(&self, expected_len: Option<usize>) -> Result<()> {
        if self.samples.is_empty() {
            return Err(CadenceError::input("empty frame"));
        }
        if let Some(expected) = expected_len {
            if self.samples.len() != expected {
                return Err(CadenceError::input(format!(
                    "frame has {} samples, expected {expected}",
                    self.samples.len()
                )));
            }
        }
        if let Some(idx) = self.samples.iter().position(|s| !s.is_finite()) {
            return Err(CadenceError::input(format!(
                "non-finite sample at index {idx}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_of_800_samples_at_16k_is_50ms() {
        let frame = Frame::constant(0.1, 800, 16_000);
        assert!((frame.duration_ms() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_bad_frames() {
        assert!(Frame::new(Vec::<f32>::new(), 16_000).validate(None).is_err());
        assert!(Frame::constant(0.1, 10, 16_000).validate(Some(20)).is_err());
        assert!(Frame::new(vec![0.0, f32::NAN], 16_000).validate(None).is_err());
        assert!(Frame::constant(0.1, 20, 16_000).validate(Some(20)).is_ok());
    }
}
