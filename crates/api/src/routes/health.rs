use ampel_mqtt::state::ConnectionState;
use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` while subscribed to the broker, `degraded` otherwise.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Broker connection state.
    pub broker: ConnectionState,
    /// Messages waiting in the ingress queue.
    pub queue_depth: usize,
    /// Messages evicted from the ingress queue since startup.
    pub dropped_messages: u64,
    /// Whether the database is reachable; `null` when persistence is disabled.
    pub db_healthy: Option<bool>,
}

/// GET /health -- returns broker, queue, and database health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let broker = *state.broker_state.borrow();

    let db_healthy = match &state.pool {
        Some(pool) => Some(ampel_db::health_check(pool).await.is_ok()),
        None => None,
    };

    let status = if broker == ConnectionState::Subscribed {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        broker,
        queue_depth: state.queue.len(),
        dropped_messages: state.queue.dropped(),
        db_healthy,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
