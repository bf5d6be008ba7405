//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod counters;
pub mod pool;
pub mod settings;
pub mod stats;
pub mod tickets;
pub mod users;

pub use pool::SqliteDb;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::DbError;

/// Zeitstempel als RFC 3339 mit fester Breite, damit lexikalische und
/// chronologische Ordnung uebereinstimmen
pub(crate) fn zeit_zu_text(zeit: &DateTime<Utc>) -> String {
    zeit.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn text_zu_zeit(text: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::UngueltigeDaten(format!("Zeitstempel '{text}': {e}")))
}

pub(crate) fn optionale_zeit(text: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    text.as_deref().map(text_zu_zeit).transpose()
}
