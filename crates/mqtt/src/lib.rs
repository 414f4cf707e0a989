//! MQTT subscriber for sensor node telemetry.
//!
//! Provides broker address resolution and client construction, an explicit
//! connection state machine with reconnect backoff, and the event loop that
//! forwards every received publish onto the
//! [`IngressQueue`](ampel_pipeline::IngressQueue).

pub mod client;
pub mod manager;
pub mod processor;
pub mod reconnect;
pub mod state;
