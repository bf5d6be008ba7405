//! Repository-Trait-Definitionen
//!
//! Engine und Koordinator arbeiten ausschliesslich gegen diese Traits.
//! `SqliteDb` implementiert alle davon; Tests koennen einzelne Traits
//! durch In-Memory-Attrappen ersetzen.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use queuedesk_core::{CounterId, TicketId, TicketStatus, TicketTyp, UserId};

use crate::error::DbError;
use crate::models::{
    BenutzerRecord, BenutzerUpdate, CounterRecord, CounterUpdate, NeuerBenutzer, NeuerCounter,
    NeuesTicket, TicketMitCounter, TicketRecord, TicketStatRecord,
};

/// Ergebnis-Typ fuer alle Datenbankoperationen
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://queuedesk.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://queuedesk.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

// ---------------------------------------------------------------------------
// TicketRepository
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Legt ein Ticket mit der naechsten Tagesnummer an
    ///
    /// Nummernvergabe und Einfuegen passieren in einer einzigen Anweisung.
    async fn create_next(&self, data: NeuesTicket<'_>) -> DbResult<TicketRecord>;

    async fn get_by_id(&self, id: TicketId) -> DbResult<Option<TicketRecord>>;

    async fn get_with_counter(&self, id: TicketId) -> DbResult<Option<TicketMitCounter>>;

    /// Alle Tickets (optional nach Status gefiltert), aelteste zuerst
    async fn list(&self, status: Option<TicketStatus>) -> DbResult<Vec<TicketMitCounter>>;

    /// Alle CALLING-Tickets, zuletzt aufgerufene zuerst
    async fn list_calling(&self) -> DbResult<Vec<TicketMitCounter>>;

    /// WAITING-Tickets in Aufrufreihenfolge (PRIORITY vor NORMAL, dann FIFO)
    async fn list_waiting(&self, typ: Option<TicketTyp>, limit: i64) -> DbResult<Vec<TicketRecord>>;

    async fn find_calling_for_counter(&self, counter_id: CounterId) -> DbResult<Option<TicketRecord>>;

    /// Setzt ein WAITING-Ticket auf CALLING am angegebenen Schalter
    async fn mark_calling(
        &self,
        id: TicketId,
        counter_id: CounterId,
        called_at: DateTime<Utc>,
    ) -> DbResult<TicketMitCounter>;

    /// Setzt den Status; `finished_at` wird nur ueberschrieben wenn `Some`
    async fn update_status(
        &self,
        id: TicketId,
        status: TicketStatus,
        finished_at: Option<DateTime<Utc>>,
    ) -> DbResult<Option<TicketMitCounter>>;

    async fn delete(&self, id: TicketId) -> DbResult<bool>;

    async fn delete_by_status(&self, status: TicketStatus) -> DbResult<u64>;

    async fn delete_all(&self) -> DbResult<u64>;
}

// ---------------------------------------------------------------------------
// StatsRepository
// ---------------------------------------------------------------------------

#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Erhoeht den Tageszaehler fuer (Datum, Typ) um eins
    async fn increment(&self, date: NaiveDate, typ: TicketTyp) -> DbResult<()>;

    /// Alle Tageszaehler, neueste zuerst
    async fn list(&self) -> DbResult<Vec<TicketStatRecord>>;
}

// ---------------------------------------------------------------------------
// CounterRepository
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Legt einen Schalter mit der niedrigsten freien ID an
    async fn create(&self, data: NeuerCounter<'_>) -> DbResult<CounterRecord>;

    async fn get_by_id(&self, id: CounterId) -> DbResult<Option<CounterRecord>>;

    async fn list(&self) -> DbResult<Vec<CounterRecord>>;

    async fn update(&self, id: CounterId, data: CounterUpdate) -> DbResult<CounterRecord>;

    async fn delete(&self, id: CounterId) -> DbResult<bool>;
}

// ---------------------------------------------------------------------------
// UserRepository
// ---------------------------------------------------------------------------

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord>;

    async fn get_by_id(&self, id: UserId) -> DbResult<Option<BenutzerRecord>>;

    async fn list(&self) -> DbResult<Vec<BenutzerRecord>>;

    /// Setzt das Online-Flag; `NichtGefunden` wenn der Benutzer fehlt
    async fn set_online(&self, id: UserId, online: bool) -> DbResult<()>;

    async fn update(&self, id: UserId, data: BenutzerUpdate) -> DbResult<BenutzerRecord>;

    async fn delete(&self, id: UserId) -> DbResult<bool>;
}

// ---------------------------------------------------------------------------
// SettingsRepository
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_all(&self) -> DbResult<BTreeMap<String, String>>;

    async fn get(&self, key: &str) -> DbResult<Option<String>>;

    /// Schreibt alle Paare in einer Transaktion
    async fn upsert_many(&self, werte: &BTreeMap<String, String>) -> DbResult<()>;
}
