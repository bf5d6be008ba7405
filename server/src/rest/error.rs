//! Fehlertypen der REST-API
//!
//! Jeder Fehler wird als `{"error": {"code": <http>, "message": <text>}}`
//! ausgeliefert.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use queuedesk_db::DbError;
use queuedesk_queue::QueueError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Datenbank(#[from] DbError),

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::UngueltigeEingabe(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::UngueltigeEingabe(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::UngueltigeEingabe(e.body_text())
    }
}

impl ApiError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Queue(e) => match e {
                QueueError::CounterUnavailable(_) => StatusCode::BAD_REQUEST,
                QueueError::DispatchLocked => StatusCode::CONFLICT,
                QueueError::NoWaitingTickets => StatusCode::BAD_REQUEST,
                QueueError::TicketNotFound(_) => StatusCode::NOT_FOUND,
                QueueError::InvalidState { .. } => StatusCode::BAD_REQUEST,
                QueueError::Datenbank(db) => db_status(db),
            },
            Self::Datenbank(db) => db_status(db),
            Self::UngueltigeEingabe(_) => StatusCode::BAD_REQUEST,
            Self::NichtGefunden(_) => StatusCode::NOT_FOUND,
        }
    }
}

fn db_status(e: &DbError) -> StatusCode {
    match e {
        DbError::NichtGefunden(_) => StatusCode::NOT_FOUND,
        DbError::Eindeutigkeit(_) => StatusCode::CONFLICT,
        DbError::UngueltigeDaten(_) => StatusCode::BAD_REQUEST,
        _ if e.ist_eindeutigkeit() => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Fehlerantwort fuer die REST-API
pub fn fehler_antwort(status: StatusCode, nachricht: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": status.as_u16(),
                "message": nachricht
            }
        })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(fehler = %self, "Anfrage fehlgeschlagen");
        } else {
            tracing::warn!(fehler = %self, status = status.as_u16(), "Anfrage abgelehnt");
        }
        fehler_antwort(status, &self.to_string())
    }
}
