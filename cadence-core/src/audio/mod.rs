//! Microphone capture via cpal, feeding the analysis ring buffer.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not** block on a lock or perform I/O, so it only downmixes to mono
//! and pushes into the SPSC ring producer. Framing and analysis happen on the
//! caller's side through `RingFrameSource` + `VadEngine::poll`.
//!
//! # Ownership
//!
//! `AudioCapture` belongs to the caller, never to the engine. Stopping the
//! engine leaves capture running; dropping `AudioCapture` closes the device.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). Create and drop `AudioCapture` on the same thread.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

use crate::{
    buffering::{create_audio_ring, AudioProducer, RingFrameSource},
    error::{CadenceError, Result},
};

#[cfg(feature = "audio-cpal")]
use crate::buffering::Producer;

/// Handle to an active input stream.
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Set to `false` to make the callback a no-op.
    running: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

impl AudioCapture {
    /// Open an input device and wire it to a frame source producing
    /// `frame_ms` frames.
    ///
    /// The returned `AudioCapture` must outlive use of the source; share the
    /// source with `source::share` before handing it to an engine.
    pub fn open_source(
        preferred_device_name: Option<&str>,
        frame_ms: u64,
    ) -> Result<(Self, RingFrameSource)> {
        let (producer, consumer) = create_audio_ring();
        let running = Arc::new(AtomicBool::new(true));
        let capture = Self::open_with_preference(producer, running, preferred_device_name)?;
        let frame_len = RingFrameSource::frame_len_for(frame_ms, capture.sample_rate);
        let source = RingFrameSource::new(consumer, frame_len, capture.sample_rate);
        Ok((capture, source))
    }

    /// Open an input device by preferred name, otherwise fall back to the
    /// default input device and then the first available one.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        producer: AudioProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let mut selected = None;

        if let Some(preferred) = preferred_device_name {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected = devices.find(|d| d.name().map(|n| n == preferred).unwrap_or(false));
                    if selected.is_none() {
                        warn!("preferred input device '{}' not found, falling back", preferred);
                    }
                }
                Err(e) => warn!("failed to list input devices while resolving preference: {e}"),
            }
        }

        let device = match selected.or_else(|| host.default_input_device()) {
            Some(device) => device,
            None => {
                let mut devices = host
                    .input_devices()
                    .map_err(|e| CadenceError::AudioDevice(e.to_string()))?;
                let fallback = devices.next().ok_or(CadenceError::NoDefaultInputDevice)?;
                warn!("no default input device, falling back to first available input");
                fallback
            }
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| CadenceError::AudioDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(sample_rate, channels, "audio config selected");

        let config: StreamConfig = supported.config();
        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                build_mono_stream::<f32>(&device, &config, producer, Arc::clone(&running))
            }
            SampleFormat::I16 => {
                build_mono_stream::<i16>(&device, &config, producer, Arc::clone(&running))
            }
            SampleFormat::U8 => {
                build_mono_stream::<u8>(&device, &config, producer, Arc::clone(&running))
            }
            fmt => {
                return Err(CadenceError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| CadenceError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }

    /// Stub when the `audio-cpal` feature is disabled.
    #[cfg(not(feature = "audio-cpal"))]
    pub fn open_with_preference(
        _producer: AudioProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(CadenceError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    /// Pause delivery: the callback no-ops from its next invocation.
    pub fn pause(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn resume(&self) {
        self.running.store(true, Ordering::Release);
    }

    pub fn is_delivering(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Build an input stream that averages interleaved channels into mono f32
/// and pushes the result into `producer`.
#[cfg(feature = "audio-cpal")]
fn build_mono_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: AudioProducer,
    running: Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let mut mono: Vec<f32> = Vec::new();
    device
        .build_input_stream(
            config,
            move |data: &[T], _info| {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                downmix_into(data, channels, &mut mono);
                let written = producer.push_slice(&mono);
                if written < mono.len() {
                    warn!("ring buffer full: dropped {} samples", mono.len() - written);
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| CadenceError::AudioStream(e.to_string()))
}

/// Average each interleaved group of `channels` samples into one f32.
/// `out` is resized in place and reused across callbacks.
#[cfg(feature = "audio-cpal")]
fn downmix_into<T>(data: &[T], channels: usize, out: &mut Vec<f32>)
where
    T: Sample,
    f32: FromSample<T>,
{
    let frames = data.len() / channels;
    out.resize(frames, 0.0);
    for (slot, group) in out.iter_mut().zip(data.chunks_exact(channels)) {
        let sum: f32 = group.iter().map(|&s| s.to_sample::<f32>()).sum();
        *slot = sum / channels as f32;
    }
}

#[cfg(all(test, feature = "audio-cpal"))]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_stereo_pairs() {
        let mut out = Vec::new();
        downmix_into(&[0.5f32, -0.5, 1.0, 0.0], 2, &mut out);
        assert_eq!(out, vec![0.0, 0.5]);
    }

    #[test]
    fn downmix_converts_i16_to_unit_range() {
        let mut out = Vec::new();
        downmix_into(&[i16::MIN, 0], 1, &mut out);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[1], 0.0);
    }
}
