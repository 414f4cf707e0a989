//! Domain logic for the AmpelIntelligence telemetry pipeline.
//!
//! Pure logic only: bounded buffers, payload decoding, the vehicle rate
//! estimator, and pipeline configuration. No network or database access;
//! the I/O crates (`ampel-mqtt`, `ampel-db`, `ampel-pipeline`) build on
//! these types.

pub mod buffer;
pub mod config;
pub mod error;
pub mod rate;
pub mod telemetry;
pub mod types;
