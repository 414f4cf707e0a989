//! Raw broker messages and the sensor telemetry payload.
//!
//! Sensor nodes publish JSON objects of the shape
//! `{"node_id", "mq_raw", "mq_pct", "dist_cm", "veh_count"}`. This module
//! decodes them into a typed [`TelemetryPayload`] and derives the
//! dashboard's air-quality percentage.

use serde::Deserialize;

use crate::types::Timestamp;

/// A message as received from the broker, before any processing.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub topic: String,
    pub payload: String,
    pub received_at: Timestamp,
}

impl RawMessage {
    /// Build a message from raw payload bytes, decoding UTF-8 lossily.
    pub fn from_bytes(topic: impl Into<String>, payload: &[u8], received_at: Timestamp) -> Self {
        Self {
            topic: topic.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            received_at,
        }
    }
}

/// Telemetry published by a sensor node.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryPayload {
    /// Node identifier, e.g. `"sem-001"`.
    pub node_id: String,
    /// Raw gas-sensor reading.
    #[serde(default)]
    pub mq_raw: Option<f64>,
    /// Gas-sensor percentage. Kept as a raw JSON value because nodes have
    /// been seen sending numeric strings; see [`clamp_percent`].
    #[serde(default)]
    pub mq_pct: Option<serde_json::Value>,
    /// Ultrasonic distance in centimetres.
    #[serde(default)]
    pub dist_cm: Option<f64>,
    /// Cumulative vehicle count since node boot.
    pub veh_count: i64,
}

impl TelemetryPayload {
    /// Air-quality percentage clamped to `[0, 100]`, if derivable.
    pub fn air_quality(&self) -> Option<i64> {
        self.mq_pct.as_ref().and_then(clamp_percent)
    }

    /// The percentage as sent, when it is a JSON number.
    pub fn raw_percent(&self) -> Option<f64> {
        self.mq_pct.as_ref().and_then(serde_json::Value::as_f64)
    }
}

/// Errors produced while decoding a telemetry payload.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Malformed telemetry payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode a telemetry payload from its JSON text.
///
/// `node_id` and `veh_count` are required; the remaining fields may be
/// absent or null.
pub fn parse_payload(text: &str) -> Result<TelemetryPayload, TelemetryError> {
    Ok(serde_json::from_str(text)?)
}

/// Convert a percentage value to an integer in `[0, 100]`.
///
/// Numbers and numeric strings are truncated toward zero and clamped.
/// Anything else (text, booleans, null, non-finite values) yields `None`.
pub fn clamp_percent(value: &serde_json::Value) -> Option<i64> {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some((number.trunc() as i64).clamp(0, 100))
}
