//! REST-Handler fuer Systemeinstellungen

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Json;
use queuedesk_db::{SettingRecord, SettingsRepository};

use crate::rest::{ApiResult, AppState};

/// `GET /settings` – alle Einstellungen als Objekt `{key: value}`
pub async fn get_settings(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    Ok(Json(state.db.get_all().await?))
}

/// `PUT /settings` – Liste von `{key, value}` upserten, liefert den neuen Stand
pub async fn put_settings(
    State(state): State<AppState>,
    body: Result<Json<Vec<SettingRecord>>, JsonRejection>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let Json(eintraege) = body?;
    let werte: BTreeMap<String, String> = eintraege
        .into_iter()
        .map(|e| (e.key, e.value))
        .collect();

    state.db.upsert_many(&werte).await?;
    tracing::info!(anzahl = werte.len(), "Einstellungen gespeichert");
    Ok(Json(state.db.get_all().await?))
}
