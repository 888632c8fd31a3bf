//! `FrameSource`: the capability the engine needs from whatever captures audio.
//!
//! The engine never owns a source. The caller creates one, wraps it in a
//! `SharedFrameSource` and hands the engine a clone; `VadEngine::stop` drops
//! only that clone, so the capture keeps running for its owner. After a device
//! change the caller re-hands a fresh handle via `VadEngine::attach_source`.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffering::frame::Frame;

/// Anything that can yield analysis frames in capture order.
pub trait FrameSource: Send {
    /// Pop the next complete frame, or `None` if none is ready yet.
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Shared, caller-owned handle to a frame source.
pub type SharedFrameSource = Arc<Mutex<dyn FrameSource>>;

/// Wrap a source so it can be shared with an engine.
pub fn share<S: FrameSource + 'static>(source: S) -> SharedFrameSource {
    Arc::new(Mutex::new(source))
}

/// In-memory queue of prepared frames. Used by replay tooling and tests.
#[derive(Debug, Default)]
pub struct QueuedFrames {
    frames: VecDeque<Frame>,
}

impl QueuedFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FromIterator<Frame> for QueuedFrames {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl FrameSource for QueuedFrames {
    fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}
