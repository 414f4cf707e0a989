//! Persisted sensor measurements (append-only).

/// DTO for inserting a new measurement row.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMeasurement {
    pub mq_raw: Option<f64>,
    pub mq_pct: Option<f64>,
    pub dist_cm: Option<f64>,
    pub veh_count: i64,
}
