//! Sensor node registry.

use ampel_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `nodes` table.
///
/// `id` is the storage key measurements reference; `node_id` is the
/// identifier the node publishes in its telemetry.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Node {
    pub id: DbId,
    pub node_id: String,
    pub name: Option<String>,
    pub created_at: Timestamp,
}
