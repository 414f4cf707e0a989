//! Repository for the `nodes` table.

use ampel_core::types::DbId;
use sqlx::PgPool;

use crate::models::node::Node;

/// Column list for `nodes` queries.
const COLUMNS: &str = "id, node_id, name, created_at";

/// Provides lookups against the node registry.
pub struct NodeRepo;

impl NodeRepo {
    /// Resolve a published node identifier to its storage key.
    ///
    /// Returns `None` if the node is not registered.
    pub async fn find_id_by_node_id(
        pool: &PgPool,
        node_id: &str,
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM nodes WHERE node_id = $1")
            .bind(node_id)
            .fetch_optional(pool)
            .await
    }

    /// List all registered nodes ordered by `node_id`.
    pub async fn list(pool: &PgPool) -> Result<Vec<Node>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM nodes ORDER BY node_id");
        sqlx::query_as::<_, Node>(&query).fetch_all(pool).await
    }
}
