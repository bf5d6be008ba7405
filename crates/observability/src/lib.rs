//! # queuedesk-observability
//!
//! Observability-Crate fuer QueueDesk:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber
//! - Request-Timing Middleware

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::{log_format_gueltig, log_level_gueltig, logging_initialisieren};
pub use metrics::{metrics_router, QueueDeskMetrics};
pub use middleware::{request_timing_layer, timing_middleware};

use axum::Router;

/// Router mit `/health` und `/metrics`
pub fn observability_router(health: HealthState, metriken: QueueDeskMetrics) -> Router {
    Router::new()
        .merge(health_router(health))
        .merge(metrics_router(metriken))
}
