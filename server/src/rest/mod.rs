//! REST-API fuer Kiosk, Schalter, Display und Verwaltung

pub mod counters;
pub mod error;
pub mod settings;
pub mod tickets;
pub mod users;

use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use queuedesk_core::EventBus;
use queuedesk_db::SqliteDb;
use queuedesk_observability::QueueDeskMetrics;
use queuedesk_queue::QueueEngine;

pub use error::{ApiError, ApiResult};

/// Axum-State der REST-Handler
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueueEngine<SqliteDb>>,
    pub db: Arc<SqliteDb>,
    /// Fuer Aenderungen ausserhalb der Engine (Benutzer, Presence-Korrektur)
    pub bus: Arc<dyn EventBus>,
    pub metriken: QueueDeskMetrics,
}

impl AppState {
    pub fn neu(
        engine: Arc<QueueEngine<SqliteDb>>,
        db: Arc<SqliteDb>,
        bus: Arc<dyn EventBus>,
        metriken: QueueDeskMetrics,
    ) -> Self {
        Self {
            engine,
            db,
            bus,
            metriken,
        }
    }
}

/// Erstellt den vollstaendigen REST-Router
///
/// Feste Pfade unter `/tickets/` sind vor `/tickets/:id` registriert,
/// axum bevorzugt sie ohnehin gegenueber dem Platzhalter.
///
/// `clear-waiting`, `POST /settings` und `/users/:id/status` sind Aliase
/// fuer bestehende Clients.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Tickets
        .route(
            "/tickets",
            post(tickets::create_ticket).get(tickets::list_tickets),
        )
        .route("/tickets/calling", get(tickets::calling_tickets))
        .route("/tickets/waiting", get(tickets::waiting_tickets))
        .route("/tickets/stats", get(tickets::statistics))
        .route("/tickets/call-next", post(tickets::call_next))
        .route("/tickets/recall", post(tickets::recall))
        .route("/tickets/clear-completed", delete(tickets::delete_completed))
        .route("/tickets/clear-waiting", delete(tickets::delete_completed))
        .route("/tickets/all", delete(tickets::delete_all))
        .route("/tickets/:id", delete(tickets::delete_ticket))
        .route("/tickets/:id/status", patch(tickets::update_status))
        // Schalter
        .route(
            "/counters",
            get(counters::list_counters).post(counters::create_counter),
        )
        .route(
            "/counters/:id",
            get(counters::get_counter)
                .patch(counters::update_counter)
                .delete(counters::delete_counter),
        )
        // Einstellungen
        .route(
            "/settings",
            get(settings::get_settings)
                .put(settings::put_settings)
                .post(settings::put_settings),
        )
        // Benutzer
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            patch(users::update_user).delete(users::delete_user),
        )
        .route("/users/:id/online", patch(users::set_online))
        .route("/users/:id/status", patch(users::set_online))
        .with_state(state)
}
