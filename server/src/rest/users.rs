//! REST-Handler fuer Benutzer und manuelle Presence-Korrektur

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use queuedesk_core::{CounterId, EventBus, QueueEvent, UserId};
use queuedesk_db::{BenutzerRecord, BenutzerUpdate, NeuerBenutzer, UserRepository};
use serde::Deserialize;

use crate::rest::{ApiError, ApiResult, AppState};

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<BenutzerRecord>>> {
    Ok(Json(UserRepository::list(state.db.as_ref()).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenutzerErstellenBody {
    pub username: String,
    pub counter_id: Option<CounterId>,
}

pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<BenutzerErstellenBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BenutzerRecord>)> {
    let Json(body) = body?;
    let username = body.username.trim();
    if username.is_empty() {
        return Err(ApiError::UngueltigeEingabe(
            "Benutzername darf nicht leer sein".into(),
        ));
    }

    let benutzer = UserRepository::create(
        state.db.as_ref(),
        NeuerBenutzer {
            username,
            counter_id: body.counter_id,
        },
    )
    .await?;
    tracing::info!(user_id = %benutzer.id, username = %benutzer.username, "Benutzer angelegt");
    Ok((StatusCode::CREATED, Json(benutzer)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineBody {
    pub is_online: bool,
}

/// `PATCH /users/:id/online` – ueberschreibt den gespeicherten Online-Status
///
/// Die naechste Verbindungsaenderung des Benutzers setzt ihn wieder
/// automatisch. Displays erhalten ein `queueUpdate`, da sich die
/// Verfuegbarkeit des Schalters aendern kann.
pub async fn set_online(
    State(state): State<AppState>,
    id: Result<Path<UserId>, PathRejection>,
    body: Result<Json<OnlineBody>, JsonRejection>,
) -> ApiResult<Json<BenutzerRecord>> {
    let Path(id) = id?;
    let Json(body) = body?;
    state.db.set_online(id, body.is_online).await?;
    tracing::info!(user_id = %id, online = body.is_online, "Online-Status manuell gesetzt");
    state.bus.an_alle_senden(QueueEvent::QueueUpdate);

    UserRepository::get_by_id(state.db.as_ref(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NichtGefunden(id.to_string()))
}

/// `PATCH /users/:id` – Umbenennen oder anderem Schalter zuordnen
pub async fn update_user(
    State(state): State<AppState>,
    id: Result<Path<UserId>, PathRejection>,
    body: Result<Json<BenutzerUpdate>, JsonRejection>,
) -> ApiResult<Json<BenutzerRecord>> {
    let Path(id) = id?;
    let Json(mut body) = body?;
    if let Some(name) = body.username.as_mut() {
        let getrimmt = name.trim();
        if getrimmt.is_empty() {
            return Err(ApiError::UngueltigeEingabe(
                "Benutzername darf nicht leer sein".into(),
            ));
        }
        *name = getrimmt.to_string();
    }

    let benutzer = UserRepository::update(state.db.as_ref(), id, body).await?;
    tracing::info!(
        user_id = %benutzer.id,
        username = %benutzer.username,
        counter_id = ?benutzer.counter_id,
        "Benutzer geaendert"
    );
    state.bus.an_alle_senden(QueueEvent::QueueUpdate);
    Ok(Json(benutzer))
}

pub async fn delete_user(
    State(state): State<AppState>,
    id: Result<Path<UserId>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    if !UserRepository::delete(state.db.as_ref(), id).await? {
        return Err(ApiError::NichtGefunden(format!("Benutzer {id}")));
    }
    tracing::info!(user_id = %id, "Benutzer geloescht");
    state.bus.an_alle_senden(QueueEvent::QueueUpdate);
    Ok(StatusCode::NO_CONTENT)
}
