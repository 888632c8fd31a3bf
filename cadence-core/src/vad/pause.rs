//! Pause/segment detection over continuous silence episodes.
//!
//! An episode opens whenever the state machine enters `Silence`. Only
//! episodes that follow confirmed speech can fire, and each fires at most
//! once: the first tick at which the episode is `pause_duration_ms` old bumps
//! the segment counter and reports the pause.

use tracing::debug;

/// One continuous run of silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceEpisode {
    pub started_at_ms: u64,
    pub pause_fired: bool,
    /// Opened by a `Speaking → Silence` drop (as opposed to calibration).
    pub follows_speech: bool,
}

/// A pause that just fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseFired {
    pub segment_count: u64,
    pub silence_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PauseDetector {
    pause_duration_ms: u64,
    episode: Option<SilenceEpisode>,
    segment_count: u64,
}

impl PauseDetector {
    pub fn new(pause_duration_ms: u64) -> Self {
        Self {
            pause_duration_ms,
            episode: None,
            segment_count: 0,
        }
    }

    pub fn open_episode(&mut self, now_ms: u64, follows_speech: bool) {
        self.episode = Some(SilenceEpisode {
            started_at_ms: now_ms,
            pause_fired: false,
            follows_speech,
        });
    }

    /// Close the running episode (speech confirmed) and return it.
    pub fn close_episode(&mut self) -> Option<SilenceEpisode> {
        self.episode.take()
    }

    /// Move the episode start to `at_ms`. `pause_fired` is kept, so a clock
    /// restart can delay a pause but never produce a second one.
    pub fn restart_clock(&mut self, at_ms: u64) {
        if let Some(ep) = self.episode.as_mut() {
            ep.started_at_ms = at_ms;
        }
    }

    pub fn episode(&self) -> Option<&SilenceEpisode> {
        self.episode.as_ref()
    }

    pub fn silence_duration_ms(&self, now_ms: u64) -> u64 {
        self.episode
            .map(|ep| now_ms.saturating_sub(ep.started_at_ms))
            .unwrap_or(0)
    }

    /// Run once per silent tick.
    pub fn check(&mut self, now_ms: u64) -> Option<PauseFired> {
        let ep = self.episode.as_mut()?;
        if ep.pause_fired || !ep.follows_speech {
            return None;
        }
        let silence_ms = now_ms.saturating_sub(ep.started_at_ms);
        if silence_ms < self.pause_duration_ms {
            return None;
        }
        ep.pause_fired = true;
        self.segment_count += 1;
        debug!(
            segment = self.segment_count,
            silence_ms, "pause threshold crossed"
        );
        Some(PauseFired {
            segment_count: self.segment_count,
            silence_ms,
        })
    }

    pub fn segment_count(&self) -> u64 {
        self.segment_count
    }

    pub fn set_pause_duration(&mut self, pause_duration_ms: u64) {
        self.pause_duration_ms = pause_duration_ms;
    }

    /// Drop the current episode; the segment counter survives.
    pub fn clear_episode(&mut self) {
        self.episode = None;
    }

    /// Full reset for an engine restart.
    pub fn reset(&mut self) {
        self.episode = None;
        self.segment_count = 0;
    }
}
