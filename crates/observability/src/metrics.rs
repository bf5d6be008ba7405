//! Prometheus-kompatible Metriken fuer QueueDesk
//!
//! Registrierte Metriken:
//! - `queuedesk_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `queuedesk_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit
//! - `queuedesk_tickets_created_total` – Counter: Gezogene Tickets (type)
//! - `queuedesk_tickets_called_total` – Counter: Aufgerufene Tickets
//! - `queuedesk_tickets_completed_total` – Counter: Abgeschlossene Tickets

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle QueueDesk-Prometheus-Metriken
#[derive(Clone)]
pub struct QueueDeskMetrics {
    pub registry: Arc<Registry>,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,

    // Ticket-Metriken
    pub tickets_created_total: IntCounterVec,
    pub tickets_called_total: IntCounter,
    pub tickets_completed_total: IntCounter,
}

impl QueueDeskMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("queuedesk_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "queuedesk_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        // --- Ticket-Metriken ---
        let tickets_created_total = IntCounterVec::new(
            Opts::new("queuedesk_tickets_created_total", "Gezogene Tickets"),
            &["type"],
        )?;
        registry.register(Box::new(tickets_created_total.clone()))?;

        let tickets_called_total = IntCounter::with_opts(Opts::new(
            "queuedesk_tickets_called_total",
            "Aufgerufene Tickets",
        ))?;
        registry.register(Box::new(tickets_called_total.clone()))?;

        let tickets_completed_total = IntCounter::with_opts(Opts::new(
            "queuedesk_tickets_completed_total",
            "Abgeschlossene Tickets",
        ))?;
        registry.register(Box::new(tickets_completed_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            http_requests_total,
            http_request_duration_seconds,
            tickets_created_total,
            tickets_called_total,
            tickets_completed_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: QueueDeskMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<QueueDeskMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
