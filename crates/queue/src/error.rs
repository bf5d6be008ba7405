//! Fehlertypen fuer die Aufruf-Engine

use queuedesk_core::{CounterId, TicketId, TicketStatus};
use thiserror::Error;

/// Engine-Fehlertypen
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Schalter {0} existiert nicht oder ist inaktiv")]
    CounterUnavailable(CounterId),

    #[error("Aufruf gesperrt: Es laeuft gerade eine Durchsage")]
    DispatchLocked,

    #[error("Keine wartenden Tickets")]
    NoWaitingTickets,

    #[error("Ticket nicht gefunden: {0}")]
    TicketNotFound(TicketId),

    #[error("Ungueltiger Ticket-Zustand: {id} ist {status}")]
    InvalidState { id: TicketId, status: TicketStatus },

    #[error("Datenbank-Fehler: {0}")]
    Datenbank(#[from] queuedesk_db::DbError),
}

pub type QueueResult<T> = Result<T, QueueError>;
