//! Typed event payloads emitted by the engine.
//!
//! | Event | Fired |
//! |-------|-------|
//! | `SpeechStartEvent` | once per confirmed `Silence → Speaking` transition |
//! | `PauseDetectedEvent` | at most once per silence episode that follows speech |
//! | `EnergyUpdateEvent` | every analysed tick, for level meters |
//!
//! All payloads serialise camelCase so they can be forwarded verbatim to a
//! UI or transport layer.

use serde::{Deserialize, Serialize};

use crate::{error::Result, vad::VadState};

// ---------------------------------------------------------------------------
// Speech / pause events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechStartEvent {
    /// Caller clock time of the confirming tick.
    pub timestamp_ms: u64,
    /// Smoothed energy at confirmation.
    pub energy: f32,
    /// Silence that preceded the speech candidate, in seconds.
    pub prior_silence_duration_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseDetectedEvent {
    /// Segment number this pause closes (1-based, never reused).
    pub segment_count: u64,
    pub silence_duration_sec: f64,
    pub timestamp_ms: u64,
    pub noise_floor: f32,
    pub effective_threshold: f32,
}

// ---------------------------------------------------------------------------
// Energy updates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyUpdateEvent {
    pub timestamp_ms: u64,
    pub smoothed_energy: f32,
    pub is_speaking: bool,
    pub details: EnergyDetails,
}

/// Threshold values read 0.0 while calibrating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyDetails {
    pub raw_energy: f32,
    /// Silence-side threshold currently in force (release level while speaking).
    pub threshold: f32,
    pub speech_threshold: f32,
    pub noise_floor: f32,
    pub state: VadState,
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Any engine event, tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VadEvent {
    SpeechStart(SpeechStartEvent),
    PauseDetected(PauseDetectedEvent),
    EnergyUpdate(EnergyUpdateEvent),
}

impl VadEvent {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            VadEvent::SpeechStart(e) => e.timestamp_ms,
            VadEvent::PauseDetected(e) => e.timestamp_ms,
            VadEvent::EnergyUpdate(e) => e.timestamp_ms,
        }
    }

    /// Encode as a single JSON line, the format the replay tool prints.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An event with a monotonically increasing sequence number, as sent on
/// broadcast channels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencedEvent {
    pub seq: u64,
    #[serde(flatten)]
    pub event: VadEvent,
}

// ---------------------------------------------------------------------------
// Engine snapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the engine returned by `VadEngine::state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub is_running: bool,
    pub state: VadState,
    pub noise_floor: f32,
    pub effective_threshold: f32,
    pub speech_threshold: f32,
    pub smoothed_energy: f32,
    pub segment_count: u64,
    pub is_calibrating: bool,
    pub is_speaking: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_event_serializes_with_type_tag_and_camel_case() {
        let event = VadEvent::PauseDetected(PauseDetectedEvent {
            segment_count: 2,
            silence_duration_sec: 3.0,
            timestamp_ms: 9_000,
            noise_floor: 0.01,
            effective_threshold: 0.011,
        });

        let json = serde_json::to_value(&event).expect("serialize pause event");
        assert_eq!(json["type"], "pauseDetected");
        assert_eq!(json["segmentCount"], 2);
        assert_eq!(json["timestampMs"], 9_000);
        assert_eq!(json["silenceDurationSec"], 3.0);

        let round_trip: VadEvent = serde_json::from_value(json).expect("deserialize pause event");
        assert_eq!(round_trip, event);
    }

    #[test]
    fn energy_update_nests_details_with_lowercase_state() {
        let event = VadEvent::EnergyUpdate(EnergyUpdateEvent {
            timestamp_ms: 50,
            smoothed_energy: 0.02,
            is_speaking: false,
            details: EnergyDetails {
                raw_energy: 0.03,
                threshold: 0.01,
                speech_threshold: 0.013,
                noise_floor: 0.01,
                state: VadState::Calibrating,
            },
        });
        let json = serde_json::to_value(&event).expect("serialize energy event");
        assert_eq!(json["type"], "energyUpdate");
        assert_eq!(json["isSpeaking"], false);
        assert_eq!(json["details"]["state"], "calibrating");
        assert!(json["details"]["rawEnergy"].is_number());
    }

    #[test]
    fn sequenced_event_flattens_payload() {
        let seq = SequencedEvent {
            seq: 4,
            event: VadEvent::SpeechStart(SpeechStartEvent {
                timestamp_ms: 850,
                energy: 0.04,
                prior_silence_duration_sec: 0.05,
            }),
        };
        let json = serde_json::to_value(&seq).expect("serialize sequenced event");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["type"], "speechStart");
        assert_eq!(json["timestampMs"], 850);
    }

    #[test]
    fn json_line_has_no_newlines() {
        let event = VadEvent::SpeechStart(SpeechStartEvent {
            timestamp_ms: 850,
            energy: 0.04,
            prior_silence_duration_sec: 0.05,
        });
        let line = event.to_json_line().expect("encode event");
        assert!(!line.contains('\n'));
        assert!(line.contains(r#""type":"speechStart""#));
    }

    #[test]
    fn vad_state_rejects_non_lowercase_values() {
        assert!(serde_json::from_str::<VadState>(r#""Speaking""#).is_err());
        assert_eq!(
            serde_json::from_str::<VadState>(r#""speaking""#).unwrap(),
            VadState::Speaking
        );
    }
}
