//! Datenbankmodelle fuer QueueDesk
//!
//! Records werden unveraendert von der REST-API ausgeliefert und sind
//! deshalb camelCase-serialisiert.

use chrono::{DateTime, NaiveDate, Utc};
use queuedesk_core::{
    CounterId, CounterSnapshot, CounterStatus, TicketId, TicketSnapshot, TicketStatus, TicketTyp,
    UserId,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    pub id: TicketId,
    /// Tageslaufende Nummer, ueber beide Typen geteilt
    pub number: i64,
    pub display_number: String,
    #[serde(rename = "type")]
    pub typ: TicketTyp,
    pub status: TicketStatus,
    pub counter_id: Option<CounterId>,
    pub created_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Ticket zusammen mit dem zugeordneten Schalter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketMitCounter {
    #[serde(flatten)]
    pub ticket: TicketRecord,
    pub counter: Option<CounterRecord>,
}

impl TicketMitCounter {
    /// Snapshot fuer `ticketCalled`-Ereignisse
    pub fn snapshot(&self) -> TicketSnapshot {
        let t = &self.ticket;
        TicketSnapshot {
            id: t.id,
            number: t.number,
            display_number: t.display_number.clone(),
            typ: t.typ,
            status: t.status,
            counter_id: t.counter_id,
            created_at: t.created_at,
            called_at: t.called_at,
            finished_at: t.finished_at,
            counter: self.counter.as_ref().map(|c| CounterSnapshot {
                id: c.id,
                name: c.name.clone(),
                status: c.status,
            }),
        }
    }
}

/// Daten fuer ein neues Ticket; Nummer und Anzeige vergibt das Repository
#[derive(Debug, Clone)]
pub struct NeuesTicket<'a> {
    pub typ: TicketTyp,
    pub prefix: &'a str,
    pub created_at: DateTime<Utc>,
    /// Beginn des lokalen Kalendertages, ab dem die Nummerierung zaehlt
    pub tagesbeginn: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Schalter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterRecord {
    pub id: CounterId,
    pub name: String,
    pub description: Option<String>,
    pub status: CounterStatus,
    /// Mindestens ein zugeordneter Benutzer ist online
    pub is_online: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NeuerCounter<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub status: CounterStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<CounterStatus>,
}

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenutzerRecord {
    pub id: UserId,
    pub username: String,
    pub counter_id: Option<CounterId>,
    pub is_online: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NeuerBenutzer<'a> {
    pub username: &'a str,
    pub counter_id: Option<CounterId>,
}

/// Teilaenderung eines Benutzers
///
/// `counter_id`: fehlt = unveraendert, `null` = Zuordnung loesen.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenutzerUpdate {
    pub username: Option<String>,
    #[serde(default, deserialize_with = "doppelt_optional")]
    pub counter_id: Option<Option<CounterId>>,
}

fn doppelt_optional<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Statistik und Einstellungen
// ---------------------------------------------------------------------------

/// Tageszaehler pro Ticket-Typ; ueberlebt die naechtliche Bereinigung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStatRecord {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub typ: TicketTyp,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingRecord {
    pub key: String,
    pub value: String,
}
