//! Fehlertypen fuer den Signaling-Service

use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Eingehender Frame ist kein gueltiges JSON-Ereignis
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Ereignisname ist unbekannt
    #[error("Unbekanntes Ereignis: {0}")]
    UnbekanntesEreignis(String),

    /// Ereignis konnte nicht serialisiert werden
    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[from] serde_json::Error),

    /// Presence-Schreibvorgang in der Datenbank fehlgeschlagen
    #[error("Datenbank-Fehler: {0}")]
    Datenbank(#[from] queuedesk_db::DbError),
}

impl SignalingError {
    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
