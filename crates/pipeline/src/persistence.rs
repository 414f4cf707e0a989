//! Best-effort measurement persistence.
//!
//! The worker hands every decoded measurement to a [`PersistenceGateway`].
//! Persistence is at-most-once and never affects the in-memory state:
//! unknown nodes are skipped with a warning and write failures are logged
//! and dropped. [`record_measurement`] implements that policy on top of
//! any gateway.

use ampel_core::types::DbId;
use ampel_db::models::measurement::CreateMeasurement;
use ampel_db::repositories::{MeasurementRepo, NodeRepo};
use ampel_db::DbPool;
use async_trait::async_trait;

/// Errors surfaced by a [`PersistenceGateway`].
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Storage capability used by the aggregation worker.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Map a published node identifier to its storage key.
    ///
    /// `Ok(None)` means the node is not registered in storage.
    async fn resolve_storage_key(&self, node_id: &str) -> Result<Option<DbId>, PersistenceError>;

    /// Append one measurement row for the node with storage key `key`.
    async fn append_measurement(
        &self,
        key: DbId,
        measurement: &CreateMeasurement,
    ) -> Result<DbId, PersistenceError>;

    /// Whether this gateway writes anywhere at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Result of a single [`record_measurement`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// The row was inserted with this ID.
    Stored(DbId),
    /// The node is not registered; nothing was written.
    UnknownNode,
    /// Lookup or insert failed; the measurement is lost.
    Failed(String),
    /// Persistence is disabled.
    Skipped,
}

/// Resolve `node_id` and append `measurement`, logging instead of failing.
pub async fn record_measurement(
    gateway: &dyn PersistenceGateway,
    node_id: &str,
    measurement: &CreateMeasurement,
) -> RecordOutcome {
    if !gateway.is_enabled() {
        return RecordOutcome::Skipped;
    }

    let key = match gateway.resolve_storage_key(node_id).await {
        Ok(Some(key)) => key,
        Ok(None) => {
            tracing::warn!(node_id, "Node not registered in storage, skipping persistence");
            return RecordOutcome::UnknownNode;
        }
        Err(e) => {
            tracing::error!(node_id, error = %e, "Failed to resolve storage key");
            return RecordOutcome::Failed(e.to_string());
        }
    };

    match gateway.append_measurement(key, measurement).await {
        Ok(id) => {
            tracing::info!(
                node_id,
                measurement_id = id,
                mq_pct = ?measurement.mq_pct,
                dist_cm = ?measurement.dist_cm,
                veh_count = measurement.veh_count,
                "Measurement stored",
            );
            RecordOutcome::Stored(id)
        }
        Err(e) => {
            tracing::error!(node_id, error = %e, "Failed to store measurement");
            RecordOutcome::Failed(e.to_string())
        }
    }
}

/// PostgreSQL-backed gateway over the `nodes` and `measurements` tables.
#[derive(Clone)]
pub struct SqlPersistence {
    pool: DbPool,
}

impl SqlPersistence {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersistenceGateway for SqlPersistence {
    async fn resolve_storage_key(&self, node_id: &str) -> Result<Option<DbId>, PersistenceError> {
        Ok(NodeRepo::find_id_by_node_id(&self.pool, node_id).await?)
    }

    async fn append_measurement(
        &self,
        key: DbId,
        measurement: &CreateMeasurement,
    ) -> Result<DbId, PersistenceError> {
        Ok(MeasurementRepo::insert(&self.pool, key, measurement).await?)
    }
}

/// Gateway used when no database is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPersistence;

#[async_trait]
impl PersistenceGateway for DisabledPersistence {
    async fn resolve_storage_key(&self, _node_id: &str) -> Result<Option<DbId>, PersistenceError> {
        Ok(None)
    }

    async fn append_measurement(
        &self,
        _key: DbId,
        _measurement: &CreateMeasurement,
    ) -> Result<DbId, PersistenceError> {
        Err(PersistenceError::Unavailable("persistence is disabled".into()))
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
