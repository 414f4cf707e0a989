pub mod health;
pub mod telemetry;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /history                    message history, newest first
/// /peek?topic=                last message on a topic
/// /series                     per-node chart series
/// /nodes                      tracked nodes and storage registration
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(telemetry::router())
}
