//! REST-Handler fuer Schalter-Endpunkte

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use queuedesk_core::{CounterId, CounterStatus};
use queuedesk_db::{CounterRecord, CounterRepository, CounterUpdate, NeuerCounter};
use serde::Deserialize;

use crate::rest::{ApiError, ApiResult, AppState};

pub async fn list_counters(State(state): State<AppState>) -> ApiResult<Json<Vec<CounterRecord>>> {
    Ok(Json(CounterRepository::list(state.db.as_ref()).await?))
}

pub async fn get_counter(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<CounterRecord>> {
    let Path(id) = id?;
    CounterRepository::get_by_id(state.db.as_ref(), CounterId(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NichtGefunden(format!("Schalter {id}")))
}

#[derive(Debug, Deserialize)]
pub struct CounterErstellenBody {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: CounterStatus,
}

pub async fn create_counter(
    State(state): State<AppState>,
    body: Result<Json<CounterErstellenBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CounterRecord>)> {
    let Json(body) = body?;
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::UngueltigeEingabe("Name darf nicht leer sein".into()));
    }

    let counter = CounterRepository::create(
        state.db.as_ref(),
        NeuerCounter {
            name,
            description: body.description.as_deref(),
            status: body.status,
        },
    )
    .await?;
    tracing::info!(counter_id = %counter.id, name = %counter.name, "Schalter angelegt");
    Ok((StatusCode::CREATED, Json(counter)))
}

pub async fn update_counter(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<CounterUpdate>, JsonRejection>,
) -> ApiResult<Json<CounterRecord>> {
    let Path(id) = id?;
    let Json(body) = body?;
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::UngueltigeEingabe("Name darf nicht leer sein".into()));
    }
    let counter = CounterRepository::update(state.db.as_ref(), CounterId(id), body).await?;
    tracing::info!(counter_id = %counter.id, status = ?counter.status, "Schalter geaendert");
    Ok(Json(counter))
}

pub async fn delete_counter(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    if !CounterRepository::delete(state.db.as_ref(), CounterId(id)).await? {
        return Err(ApiError::NichtGefunden(format!("Schalter {id}")));
    }
    tracing::info!(counter_id = id, "Schalter geloescht");
    Ok(StatusCode::NO_CONTENT)
}
