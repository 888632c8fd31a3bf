//! Lock-free SPSC ring buffer for audio samples.
//!
//! Uses `ringbuf::HeapRb<f32>` which provides a wait-free `push_slice`
//! safe to call from the real-time audio callback. The consumer half is
//! wrapped in `RingFrameSource`, which slices the sample stream into
//! fixed-size analysis frames.

pub mod frame;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Observer, Producer};

use self::frame::Frame;
use crate::source::FrameSource;

/// Type alias for the producer half, held by the audio callback thread.
pub type AudioProducer = ringbuf::HeapProd<f32>;

/// Type alias for the consumer half, held by the frame source.
pub type AudioConsumer = ringbuf::HeapCons<f32>;

/// Buffer capacity: 2^18 = 262 144 f32 samples ≈ 5.4 s at 48 kHz.
/// The analysis side drains every tick, so a few seconds of slack is plenty.
pub const RING_CAPACITY: usize = 1 << 18;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_audio_ring() -> (AudioProducer, AudioConsumer) {
    create_audio_ring_with_capacity(RING_CAPACITY)
}

pub fn create_audio_ring_with_capacity(capacity: usize) -> (AudioProducer, AudioConsumer) {
    HeapRb::<f32>::new(capacity).split()
}

/// Frame source that pops `frame_len` samples at a time from a ring consumer.
///
/// A frame is only produced once `frame_len` samples are buffered; the
/// remainder stays in the ring for the next call.
pub struct RingFrameSource {
    consumer: AudioConsumer,
    frame_len: usize,
    sample_rate: u32,
}

impl RingFrameSource {
    pub fn new(consumer: AudioConsumer, frame_len: usize, sample_rate: u32) -> Self {
        Self {
            consumer,
            frame_len: frame_len.max(1),
            sample_rate,
        }
    }

    /// Frame length matching `interval_ms` at `sample_rate`.
    pub fn frame_len_for(interval_ms: u64, sample_rate: u32) -> usize {
        ((sample_rate as u64 * interval_ms) / 1000).max(1) as usize
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn buffered_samples(&self) -> usize {
        self.consumer.occupied_len()
    }
}

impl FrameSource for RingFrameSource {
    fn next_frame(&mut self) -> Option<Frame> {
        if self.consumer.occupied_len() < self.frame_len {
            return None;
        }
        let mut samples = vec![0f32; self.frame_len];
        let n = self.consumer.pop_slice(&mut samples);
        debug_assert_eq!(n, self.frame_len);
        Some(Frame::new(samples, self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_source_waits_for_a_full_frame() {
        let (mut producer, consumer) = create_audio_ring_with_capacity(64);
        let mut source = RingFrameSource::new(consumer, 8, 16_000);

        producer.push_slice(&[0.1; 5]);
        assert!(source.next_frame().is_none());

        producer.push_slice(&[0.2; 5]);
        let frame = source.next_frame().expect("one full frame buffered");
        assert_eq!(frame.len(), 8);
        assert_eq!(frame.samples()[..5], [0.1; 5]);
        assert_eq!(frame.samples()[5..], [0.2; 3]);
        assert_eq!(source.buffered_samples(), 2);
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn frame_len_for_50ms_at_16k() {
        assert_eq!(RingFrameSource::frame_len_for(50, 16_000), 800);
        assert_eq!(RingFrameSource::frame_len_for(0, 16_000), 1);
    }
}
