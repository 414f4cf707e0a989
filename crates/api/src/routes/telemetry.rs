//! Route definitions for the live telemetry views.

use axum::routing::get;
use axum::Router;

use crate::handlers::telemetry;
use crate::state::AppState;

/// Telemetry routes mounted under `/api/v1`.
///
/// ```text
/// GET /history   -> list_history
/// GET /peek      -> peek_last
/// GET /series    -> get_series
/// GET /nodes     -> list_nodes
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/history", get(telemetry::list_history))
        .route("/peek", get(telemetry::peek_last))
        .route("/series", get(telemetry::get_series))
        .route("/nodes", get(telemetry::list_nodes))
}
