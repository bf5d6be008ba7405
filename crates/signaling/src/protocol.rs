//! Client -> Server Nachrichten
//!
//! Frames haben dieselbe Huelle wie Server-Ereignisse:
//! `{"event": "<name>", "data": <payload>}`.

use queuedesk_core::CounterId;
use serde::Deserialize;

use crate::error::{SignalingError, SignalingResult};

/// Vom Client gesendete Ereignisse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientNachricht {
    /// Durchsage am Schalter beginnt
    VoiceStarted { counter_id: CounterId },
    /// Durchsage beendet
    VoiceFinished,
}

#[derive(Deserialize)]
struct Rohframe {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoiceStartedDaten {
    counter_id: CounterId,
}

impl ClientNachricht {
    /// Parst einen Text-Frame
    pub fn parsen(text: &str) -> SignalingResult<Self> {
        let frame: Rohframe = serde_json::from_str(text)
            .map_err(|e| SignalingError::protokoll(format!("Ungueltiger Frame: {e}")))?;

        match frame.event.as_str() {
            "voiceStarted" => {
                let daten: VoiceStartedDaten = serde_json::from_value(frame.data).map_err(|e| {
                    SignalingError::protokoll(format!("voiceStarted ohne counterId: {e}"))
                })?;
                Ok(Self::VoiceStarted {
                    counter_id: daten.counter_id,
                })
            }
            "voiceFinished" => Ok(Self::VoiceFinished),
            andere => Err(SignalingError::UnbekanntesEreignis(andere.to_string())),
        }
    }
}
