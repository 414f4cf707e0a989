use std::sync::Arc;

use ampel_core::config::PipelineConfig;
use ampel_mqtt::state::ConnectionState;
use ampel_pipeline::{IngressQueue, StateStore};
use tokio::sync::watch;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Live telemetry state written by the aggregation worker.
    pub store: Arc<StateStore>,
    /// Ingress queue, read here only for depth and drop counters.
    pub queue: Arc<IngressQueue>,
    /// Broker connection state published by the connection manager.
    pub broker_state: watch::Receiver<ConnectionState>,
    /// Database pool; `None` when persistence is disabled.
    pub pool: Option<ampel_db::DbPool>,
    pub pipeline: Arc<PipelineConfig>,
    pub config: Arc<ServerConfig>,
}
