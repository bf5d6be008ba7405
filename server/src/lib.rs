//! queuedesk-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod rest;
pub mod scheduler;


use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::{HeaderValue, Method};
use axum::Router;
use config::ServerConfig;
use queuedesk_core::{EventBus, TokioTimer, Uhr, VoiceLockGate};
use queuedesk_db::SqliteDb;
use queuedesk_observability::{
    observability_router, request_timing_layer, timing_middleware, HealthState, QueueDeskMetrics,
};
use queuedesk_queue::QueueEngine;
use queuedesk_signaling::{ws_router, EventBroadcaster, GatewayState, QueueCoordinator};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

/// Intervall der DB-Erreichbarkeitspruefung fuer `/health`
const HEALTH_INTERVALL: Duration = Duration::from_secs(30);

/// Alle Dienste eines laufenden Servers
///
/// Engine und Koordinator teilen sich denselben Broadcaster; die Engine
/// fragt die Sprachsperre beim Koordinator ab.
#[derive(Clone)]
pub struct Dienste {
    pub db: Arc<SqliteDb>,
    pub broadcaster: EventBroadcaster,
    pub koordinator: QueueCoordinator<SqliteDb>,
    pub engine: Arc<QueueEngine<SqliteDb>>,
    pub metriken: QueueDeskMetrics,
    pub health: HealthState,
}

impl Dienste {
    pub fn neu(db: Arc<SqliteDb>, config: &ServerConfig, uhr: Arc<dyn Uhr>) -> Result<Self> {
        let broadcaster = EventBroadcaster::neu();
        let bus: Arc<dyn EventBus> = Arc::new(broadcaster.clone());

        let koordinator = QueueCoordinator::neu(
            Arc::clone(&db),
            Arc::clone(&bus),
            Arc::new(TokioTimer),
            config.koordinator_config(),
        );
        let sperre: Arc<dyn VoiceLockGate> = Arc::new(koordinator.clone());
        let engine = QueueEngine::neu(Arc::clone(&db), sperre, bus, uhr);

        Ok(Self {
            db,
            broadcaster,
            koordinator,
            engine,
            metriken: QueueDeskMetrics::neu()?,
            health: HealthState::neu(),
        })
    }

    /// REST, WebSocket, `/health` und `/metrics` auf einem Router
    pub fn router(&self, cors_origins: &[String]) -> Router {
        let api = rest::api_router(rest::AppState::neu(
            Arc::clone(&self.engine),
            Arc::clone(&self.db),
            Arc::new(self.broadcaster.clone()),
            self.metriken.clone(),
        ))
        .merge(ws_router(GatewayState {
            koordinator: self.koordinator.clone(),
            broadcaster: self.broadcaster.clone(),
        }))
        .layer(axum::middleware::from_fn_with_state(
            self.metriken.clone(),
            timing_middleware,
        ));

        Router::new()
            .merge(api)
            .merge(observability_router(
                self.health.clone(),
                self.metriken.clone(),
            ))
            .layer(request_timing_layer())
            .layer(cors_layer(cors_origins))
    }
}

/// CORS: entweder spezifische Origins oder alle
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

/// Prueft periodisch die Datenbank und aktualisiert den Health-Status
fn health_pruefung_starten(
    db: Arc<SqliteDb>,
    health: HealthState,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut intervall = tokio::time::interval(HEALTH_INTERVALL);
        loop {
            tokio::select! {
                _ = intervall.tick() => {
                    let verbunden = match db.ping().await {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::error!(fehler = %e, "Datenbank nicht erreichbar");
                            false
                        }
                    };
                    health.db_status_setzen(verbunden);
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbank oeffnen und migrieren
    /// 2. Broadcaster, Koordinator und Engine aufbauen
    /// 3. Bereinigung und Health-Pruefung starten
    /// 4. HTTP-Listener (REST + WebSocket + Observability) starten
    /// 5. Auf Ctrl-C warten, danach geordnet herunterfahren
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %self.config.bind_adresse(),
            "Server startet"
        );

        let db = Arc::new(SqliteDb::oeffnen(&self.config.datenbank_config()).await?);
        let uhr: Arc<dyn Uhr> = Arc::new(queuedesk_core::SystemUhr);
        let dienste = Dienste::neu(Arc::clone(&db), &self.config, Arc::clone(&uhr))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let bereinigung = if self.config.bereinigung.aktiviert {
            let uhrzeit = self.config.bereinigung.zeitpunkt()?;
            tracing::info!(uhrzeit = %uhrzeit, "Naechtliche Bereinigung aktiviert");
            Some(scheduler::bereinigung_starten(
                Arc::clone(&dienste.engine),
                uhr,
                uhrzeit,
                shutdown_rx.clone(),
            ))
        } else {
            None
        };
        let health = health_pruefung_starten(
            Arc::clone(&db),
            dienste.health.clone(),
            shutdown_rx.clone(),
        );

        let app = dienste.router(&self.config.netzwerk.cors_origins);
        let listener = tokio::net::TcpListener::bind(self.config.bind_adresse()).await?;
        tracing::info!(adresse = %self.config.bind_adresse(), "HTTP-Listener bereit");

        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen");
            }
            tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            let _ = shutdown_tx.send(true);
        });

        let mut signal = shutdown_rx;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = signal.wait_for(|aus| *aus).await;
            })
            .await?;

        dienste.koordinator.herunterfahren();
        if let Some(task) = bereinigung {
            let _ = task.await;
        }
        let _ = health.await;
        db.schliessen().await;

        tracing::info!("Server beendet");
        Ok(())
    }
}
