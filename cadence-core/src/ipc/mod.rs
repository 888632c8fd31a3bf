//! Event delivery from the engine to its caller.
//!
//! The engine calls a `VadListener` synchronously from inside `tick`.
//! Listeners must be quick; anything slow belongs on the far side of a
//! channel, which is what `BroadcastListener` and the crossbeam `Sender`
//! impl provide.

pub mod events;

use tokio::sync::broadcast;

use self::events::{
    EnergyUpdateEvent, PauseDetectedEvent, SequencedEvent, SpeechStartEvent, VadEvent,
};

/// Callbacks fired by `VadEngine`. Every method defaults to a no-op.
pub trait VadListener: Send {
    fn on_speech_start(&mut self, _event: &SpeechStartEvent) {}

    fn on_pause_detected(&mut self, _event: &PauseDetectedEvent) {}

    /// Fired on every analysed tick, independent of transitions.
    fn on_energy_update(&mut self, _event: &EnergyUpdateEvent) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl VadListener for NullListener {}

/// Forwards events to a synchronous crossbeam channel. A disconnected
/// receiver is not an error; events are simply dropped.
impl VadListener for crossbeam_channel::Sender<VadEvent> {
    fn on_speech_start(&mut self, event: &SpeechStartEvent) {
        let _ = self.send(VadEvent::SpeechStart(event.clone()));
    }

    fn on_pause_detected(&mut self, event: &PauseDetectedEvent) {
        let _ = self.send(VadEvent::PauseDetected(event.clone()));
    }

    fn on_energy_update(&mut self, event: &EnergyUpdateEvent) {
        let _ = self.send(VadEvent::EnergyUpdate(event.clone()));
    }
}

/// Broadcast channel capacity: 256 events buffered for slow subscribers.
const BROADCAST_CAP: usize = 256;

/// Fans events out to any number of async subscribers.
///
/// Energy updates arrive every tick and can crowd out the rarer speech/pause
/// events for lagging receivers, so they are opt-in.
pub struct BroadcastListener {
    tx: broadcast::Sender<SequencedEvent>,
    seq: u64,
    include_energy: bool,
}

impl BroadcastListener {
    pub fn new(include_energy: bool) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            tx,
            seq: 0,
            include_energy,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SequencedEvent> {
        self.tx.subscribe()
    }

    /// Clone of the sender, for handing out subscriptions after the listener
    /// has been moved into an engine.
    pub fn sender(&self) -> broadcast::Sender<SequencedEvent> {
        self.tx.clone()
    }

    fn publish(&mut self, event: VadEvent) {
        let seq = self.seq;
        self.seq = self.seq.saturating_add(1);
        // No subscribers is fine.
        let _ = self.tx.send(SequencedEvent { seq, event });
    }
}

impl VadListener for BroadcastListener {
    fn on_speech_start(&mut self, event: &SpeechStartEvent) {
        self.publish(VadEvent::SpeechStart(event.clone()));
    }

    fn on_pause_detected(&mut self, event: &PauseDetectedEvent) {
        self.publish(VadEvent::PauseDetected(event.clone()));
    }

    fn on_energy_update(&mut self, event: &EnergyUpdateEvent) {
        if self.include_energy {
            self.publish(VadEvent::EnergyUpdate(event.clone()));
        }
    }
}
