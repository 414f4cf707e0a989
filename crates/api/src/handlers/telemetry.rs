//! Read-only handlers over the live telemetry state.
//!
//! Everything here reads the in-memory [`StateStore`](ampel_pipeline::StateStore);
//! only [`list_nodes`] touches the database, and only when one is configured.

use std::collections::HashSet;

use ampel_core::error::CoreError;
use ampel_db::repositories::NodeRepo;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for [`list_history`].
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Return only the newest `limit` entries.
    pub limit: Option<usize>,
}

/// Query parameters for [`peek_last`].
#[derive(Debug, Deserialize)]
pub struct PeekParams {
    pub topic: Option<String>,
}

/// A tracked node and whether storage knows about it.
#[derive(Debug, Serialize)]
pub struct NodeStatus {
    pub node_id: String,
    pub topic: String,
    /// `None` when persistence is disabled.
    pub registered: Option<bool>,
}

/// GET /api/v1/history
///
/// Message history, newest first.
pub async fn list_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> AppResult<impl IntoResponse> {
    let mut history = state.store.list_history().await;

    if let Some(limit) = params.limit {
        if limit == 0 {
            return Err(AppError::Core(CoreError::Validation(
                "limit must be at least 1".into(),
            )));
        }
        history.truncate(limit);
    }

    Ok(Json(DataResponse { data: history }))
}

/// GET /api/v1/peek?topic=<topic>
///
/// Last message seen on `topic`, or `null` if none (or no topic given).
pub async fn peek_last(
    State(state): State<AppState>,
    Query(params): Query<PeekParams>,
) -> AppResult<impl IntoResponse> {
    let entry = match params.topic.as_deref().map(str::trim) {
        None => None,
        Some("") => return Err(AppError::BadRequest("topic must not be empty".into())),
        Some(topic) => state.store.peek_last(topic).await,
    };

    Ok(Json(DataResponse { data: entry }))
}

/// GET /api/v1/series
///
/// Lockstep label / air-quality / vehicle-rate series keyed by node id.
pub async fn get_series(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: state.store.series().await,
    })
}

/// GET /api/v1/nodes
///
/// Tracked nodes with their topics, flagged by storage registration.
pub async fn list_nodes(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let registered: Option<HashSet<String>> = match &state.pool {
        Some(pool) => Some(
            NodeRepo::list(pool)
                .await?
                .into_iter()
                .map(|n| n.node_id)
                .collect(),
        ),
        None => None,
    };

    let nodes: Vec<NodeStatus> = state
        .pipeline
        .nodes
        .iter()
        .map(|n| NodeStatus {
            node_id: n.node_id.clone(),
            topic: n.topic.clone(),
            registered: registered.as_ref().map(|set| set.contains(&n.node_id)),
        })
        .collect();

    Ok(Json(DataResponse { data: nodes }))
}
