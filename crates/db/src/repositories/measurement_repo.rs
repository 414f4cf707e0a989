//! Repository for the `measurements` table (append-only time-series).

use ampel_core::types::DbId;
use sqlx::PgPool;

use crate::models::measurement::CreateMeasurement;

/// Provides write operations for measurements.
pub struct MeasurementRepo;

impl MeasurementRepo {
    /// Insert a single measurement for the node with storage key `node_ref`,
    /// returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        node_ref: DbId,
        measurement: &CreateMeasurement,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO measurements (node_ref, mq_raw, mq_pct, dist_cm, veh_count) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(node_ref)
        .bind(measurement.mq_raw)
        .bind(measurement.mq_pct)
        .bind(measurement.dist_cm)
        .bind(measurement.veh_count)
        .fetch_one(pool)
        .await
    }
}
