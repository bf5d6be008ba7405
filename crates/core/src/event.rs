//! Ereignisse und Event-Bus-Schnittstelle
//!
//! Die Engine und der Koordinator kennen nur den `EventBus`-Trait. Die
//! konkrete Verteilung an die offenen Verbindungen uebernimmt der
//! `EventBroadcaster` im Signaling-Crate.
//!
//! Das Wire-Format ist JSON: `{"event": "<name>", "data": <payload>}`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{ConnectionId, CounterId, CounterStatus, TicketId, TicketStatus, TicketTyp};

/// Schalter-Anteil eines Ticket-Snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub id: CounterId,
    pub name: String,
    pub status: CounterStatus,
}

/// Vollstaendiger Ticket-Zustand wie er an Displays gesendet wird
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSnapshot {
    pub id: TicketId,
    pub number: i64,
    pub display_number: String,
    #[serde(rename = "type")]
    pub typ: TicketTyp,
    pub status: TicketStatus,
    pub counter_id: Option<CounterId>,
    pub created_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counter: Option<CounterSnapshot>,
}

/// Zustand der globalen Sprachsperre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceStatus {
    pub is_speaking: bool,
    pub counter_id: Option<CounterId>,
}

impl VoiceStatus {
    /// Freigegebene Sperre
    pub fn frei() -> Self {
        Self::default()
    }
}

/// Alle Ereignisse die Server -> Client fliessen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum QueueEvent {
    /// Warteschlange hat sich geaendert – Clients laden neu
    QueueUpdate,
    /// Ein Ticket wird (erneut) aufgerufen
    TicketCalled(TicketSnapshot),
    /// Sprachsperre wurde gesetzt oder freigegeben
    VoiceStatusUpdate(VoiceStatus),
}

/// Verteilt Ereignisse an die offenen Verbindungen
///
/// Senden ist fire-and-forget: volle oder geschlossene Queues verwerfen
/// das Ereignis, der Aufrufer blockiert nie.
pub trait EventBus: Send + Sync + 'static {
    /// Sendet an alle Verbindungen, gibt die Anzahl erfolgreicher Sendungen zurueck
    fn an_alle_senden(&self, event: QueueEvent) -> usize;

    /// Sendet privat an eine einzelne Verbindung
    fn an_verbindung_senden(&self, verbindung: ConnectionId, event: QueueEvent) -> bool;
}

/// Abfrage der Sprachsperre durch die Engine (`call_next`-Sperre)
pub trait VoiceLockGate: Send + Sync + 'static {
    fn is_held(&self) -> bool;
}

/// Event-Bus der alle Ereignisse nur aufzeichnet
///
/// Fuer Tests und Werkzeuge ohne echte Verbindungen.
#[derive(Debug, Default)]
pub struct AufzeichnenderBus {
    an_alle: Mutex<Vec<QueueEvent>>,
    privat: Mutex<Vec<(ConnectionId, QueueEvent)>>,
}

impl AufzeichnenderBus {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Alle bisher gebroadcasteten Ereignisse
    pub fn gesendet(&self) -> Vec<QueueEvent> {
        self.an_alle.lock().clone()
    }

    /// Alle privat gesendeten Ereignisse
    pub fn privat_gesendet(&self) -> Vec<(ConnectionId, QueueEvent)> {
        self.privat.lock().clone()
    }

    /// Anzahl der gebroadcasteten `QueueUpdate`-Ereignisse
    pub fn queue_updates(&self) -> usize {
        self.an_alle
            .lock()
            .iter()
            .filter(|e| matches!(e, QueueEvent::QueueUpdate))
            .count()
    }

    pub fn leeren(&self) {
        self.an_alle.lock().clear();
        self.privat.lock().clear();
    }
}

impl EventBus for AufzeichnenderBus {
    fn an_alle_senden(&self, event: QueueEvent) -> usize {
        self.an_alle.lock().push(event);
        1
    }

    fn an_verbindung_senden(&self, verbindung: ConnectionId, event: QueueEvent) -> bool {
        self.privat.lock().push((verbindung, event));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_update_ohne_daten() {
        let json = serde_json::to_string(&QueueEvent::QueueUpdate).unwrap();
        assert_eq!(json, r#"{"event":"queueUpdate"}"#);
    }

    #[test]
    fn voice_status_wire_format() {
        let event = QueueEvent::VoiceStatusUpdate(VoiceStatus {
            is_speaking: true,
            counter_id: Some(CounterId(2)),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "voiceStatusUpdate");
        assert_eq!(json["data"]["isSpeaking"], true);
        assert_eq!(json["data"]["counterId"], 2);

        let frei = serde_json::to_value(QueueEvent::VoiceStatusUpdate(VoiceStatus::frei())).unwrap();
        assert_eq!(frei["data"]["isSpeaking"], false);
        assert!(frei["data"]["counterId"].is_null());
    }

    #[test]
    fn ticket_snapshot_camel_case() {
        let snapshot = TicketSnapshot {
            id: TicketId::new(),
            number: 7,
            display_number: "P-7".into(),
            typ: TicketTyp::Priority,
            status: TicketStatus::Calling,
            counter_id: Some(CounterId(1)),
            created_at: Utc::now(),
            called_at: Some(Utc::now()),
            finished_at: None,
            counter: Some(CounterSnapshot {
                id: CounterId(1),
                name: "Schalter 1".into(),
                status: CounterStatus::Active,
            }),
        };
        let json = serde_json::to_value(QueueEvent::TicketCalled(snapshot)).unwrap();
        assert_eq!(json["event"], "ticketCalled");
        assert_eq!(json["data"]["displayNumber"], "P-7");
        assert_eq!(json["data"]["type"], "PRIORITY");
        assert_eq!(json["data"]["counter"]["name"], "Schalter 1");
    }

    #[test]
    fn aufzeichnender_bus_zaehlt_updates() {
        let bus = AufzeichnenderBus::neu();
        bus.an_alle_senden(QueueEvent::QueueUpdate);
        bus.an_alle_senden(QueueEvent::VoiceStatusUpdate(VoiceStatus::frei()));
        bus.an_verbindung_senden(ConnectionId::new(), QueueEvent::QueueUpdate);
        assert_eq!(bus.queue_updates(), 1);
        assert_eq!(bus.gesendet().len(), 2);
        assert_eq!(bus.privat_gesendet().len(), 1);
    }
}
