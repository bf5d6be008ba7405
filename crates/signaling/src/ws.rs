//! WebSocket-Gateway (`GET /ws?userId=<uuid>`)
//!
//! Pro Verbindung laufen zwei Teile: ein Sende-Task, der die Queue aus dem
//! Broadcaster in den Socket schreibt, und die Empfangsschleife, die
//! `voiceStarted`/`voiceFinished` an den Koordinator weitergibt.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use queuedesk_core::{ConnectionId, UserId};
use queuedesk_db::UserRepository;
use serde::Deserialize;

use crate::broadcast::EventBroadcaster;
use crate::coordinator::QueueCoordinator;
use crate::protocol::ClientNachricht;

/// Query-Parameter beim Verbindungsaufbau
#[derive(Debug, Default, Deserialize)]
pub struct VerbindungsParameter {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Zustand des Gateways
pub struct GatewayState<U: UserRepository + 'static> {
    pub koordinator: QueueCoordinator<U>,
    pub broadcaster: EventBroadcaster,
}

impl<U: UserRepository + 'static> Clone for GatewayState<U> {
    fn clone(&self) -> Self {
        Self {
            koordinator: self.koordinator.clone(),
            broadcaster: self.broadcaster.clone(),
        }
    }
}

/// Router mit der WebSocket-Route
pub fn ws_router<U: UserRepository + 'static>(state: GatewayState<U>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::<U>))
        .with_state(state)
}

async fn ws_handler<U: UserRepository + 'static>(
    ws: WebSocketUpgrade,
    Query(params): Query<VerbindungsParameter>,
    State(state): State<GatewayState<U>>,
) -> impl IntoResponse {
    let user_id = params.user_id.as_deref().and_then(user_id_parsen);
    ws.on_upgrade(move |socket| verbindung_bedienen(socket, state, user_id))
}

pub(crate) fn user_id_parsen(roh: &str) -> Option<UserId> {
    if roh.is_empty() {
        return None;
    }
    match roh.parse::<UserId>() {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(user_id = %roh, fehler = %e, "Ungueltige userId, Verbindung ohne Presence");
            None
        }
    }
}

async fn verbindung_bedienen<U: UserRepository + 'static>(
    socket: WebSocket,
    state: GatewayState<U>,
    user_id: Option<UserId>,
) {
    let verbindung = ConnectionId::new();
    tracing::info!(verbindung = %verbindung, user_id = ?user_id, "WebSocket verbunden");

    // Vor `connect` registrieren, damit der Sperren-Snapshot ankommt
    let mut rx = state.broadcaster.verbindung_registrieren(verbindung);
    state.koordinator.connect(verbindung, user_id).await;

    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.to_string())).await.is_err() {
                tracing::debug!(verbindung = %verbindung, "WebSocket-Sink geschlossen");
                break;
            }
        }
    });

    while let Some(ergebnis) = stream.next().await {
        match ergebnis {
            Ok(Message::Text(text)) => nachricht_verarbeiten(&state.koordinator, verbindung, &text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(verbindung = %verbindung, fehler = %e, "WebSocket-Empfangsfehler");
                break;
            }
        }
    }

    state.koordinator.disconnect(verbindung);
    state.broadcaster.verbindung_entfernen(&verbindung);
    send_task.abort();
    tracing::info!(verbindung = %verbindung, "WebSocket getrennt");
}

/// Leitet eine Client-Nachricht an den Koordinator weiter
pub fn nachricht_verarbeiten<U: UserRepository + 'static>(
    koordinator: &QueueCoordinator<U>,
    verbindung: ConnectionId,
    text: &str,
) {
    match ClientNachricht::parsen(text) {
        Ok(ClientNachricht::VoiceStarted { counter_id }) => koordinator.acquire(counter_id),
        Ok(ClientNachricht::VoiceFinished) => koordinator.release(),
        Err(e) => {
            tracing::warn!(verbindung = %verbindung, fehler = %e, "Client-Nachricht verworfen");
        }
    }
}
