//! REST-Handler fuer Ticket-Endpunkte

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use queuedesk_core::{CounterId, TicketId, TicketStatus, TicketTyp};
use queuedesk_db::{TicketMitCounter, TicketRecord};
use queuedesk_queue::Statistik;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::rest::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct TicketErstellenBody {
    #[serde(rename = "type", default)]
    pub typ: Option<TicketTyp>,
}

/// `POST /tickets` – Kiosk zieht ein Ticket, der Body ist optional
pub async fn create_ticket(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<TicketRecord>)> {
    let body: TicketErstellenBody = if body.iter().all(u8::is_ascii_whitespace) {
        TicketErstellenBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::UngueltigeEingabe(e.to_string()))?
    };
    let typ = body.typ.unwrap_or_default();

    let ticket = state.engine.create(typ).await?;
    state
        .metriken
        .tickets_created_total
        .with_label_values(&[typ.als_str()])
        .inc();
    Ok((StatusCode::CREATED, Json(ticket)))
}

#[derive(Debug, Deserialize)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
}

pub async fn list_tickets(
    State(state): State<AppState>,
    filter: Result<Query<TicketFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<TicketMitCounter>>> {
    let Query(filter) = filter?;
    Ok(Json(state.engine.find_all(filter.status).await?))
}

pub async fn calling_tickets(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TicketMitCounter>>> {
    Ok(Json(state.engine.get_calling_tickets().await?))
}

#[derive(Debug, Deserialize)]
pub struct WarteFilter {
    pub limit: Option<i64>,
}

pub async fn waiting_tickets(
    State(state): State<AppState>,
    filter: Result<Query<WarteFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<TicketRecord>>> {
    let Query(filter) = filter?;
    Ok(Json(state.engine.get_waiting_tickets(filter.limit).await?))
}

pub async fn statistics(State(state): State<AppState>) -> ApiResult<Json<Statistik>> {
    Ok(Json(state.engine.get_statistics().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallNextBody {
    pub counter_id: CounterId,
    #[serde(rename = "type", default)]
    pub typ: Option<TicketTyp>,
}

pub async fn call_next(
    State(state): State<AppState>,
    body: Result<Json<CallNextBody>, JsonRejection>,
) -> ApiResult<Json<TicketMitCounter>> {
    let Json(body) = body?;
    let ticket = state.engine.call_next(body.counter_id, body.typ).await?;
    state.metriken.tickets_called_total.inc();
    Ok(Json(ticket))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: TicketStatus,
}

pub async fn update_status(
    State(state): State<AppState>,
    id: Result<Path<TicketId>, PathRejection>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<Json<TicketMitCounter>> {
    let Path(id) = id?;
    let Json(body) = body?;
    let ticket = state.engine.update_status(id, body.status).await?;
    if body.status == TicketStatus::Completed {
        state.metriken.tickets_completed_total.inc();
    }
    Ok(Json(ticket))
}

#[derive(Debug, Deserialize)]
pub struct RecallBody {
    pub id: TicketId,
}

pub async fn recall(
    State(state): State<AppState>,
    body: Result<Json<RecallBody>, JsonRejection>,
) -> ApiResult<Json<TicketMitCounter>> {
    let Json(body) = body?;
    Ok(Json(state.engine.recall(body.id).await?))
}

pub async fn delete_completed(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let anzahl = state.engine.delete_completed().await?;
    Ok(Json(json!({ "count": anzahl })))
}

pub async fn delete_all(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let anzahl = state.engine.delete_all().await?;
    Ok(Json(json!({ "count": anzahl })))
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    id: Result<Path<TicketId>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    state.engine.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
