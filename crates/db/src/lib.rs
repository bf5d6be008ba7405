//! queuedesk-db – Datenbank-Abstraktion
//!
//! Repository-Traits fuer Tickets, Tagesstatistik, Schalter, Benutzer und
//! Einstellungen sowie deren SQLite-Implementierung (`SqliteDb`).

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use models::{
    BenutzerRecord, BenutzerUpdate, CounterRecord, CounterUpdate, NeuerBenutzer, NeuerCounter,
    NeuesTicket, SettingRecord, TicketMitCounter, TicketRecord, TicketStatRecord,
};
pub use repository::{
    CounterRepository, DatabaseConfig, DbResult, SettingsRepository, StatsRepository,
    TicketRepository, UserRepository,
};
pub use sqlite::SqliteDb;
