//! Ingestion and aggregation pipeline.
//!
//! Messages flow one way:
//!
//! ```text
//! connection manager --push--> IngressQueue --pop--> AggregationWorker
//!                                                      |        |
//!                                               StateStore   PersistenceGateway
//! ```
//!
//! - [`IngressQueue`]: bounded drop-oldest queue between the broker
//!   connection and the worker.
//! - [`AggregationWorker`]: the single writer of the [`StateStore`].
//! - [`StateStore`]: bounded history, last message per topic, and node
//!   series; read by the HTTP layer through its query methods.
//! - [`PersistenceGateway`]: best-effort measurement storage.

pub mod persistence;
pub mod queue;
pub mod store;
pub mod worker;

pub use persistence::{
    record_measurement, DisabledPersistence, PersistenceError, PersistenceGateway, RecordOutcome,
    SqlPersistence,
};
pub use queue::IngressQueue;
pub use store::{HistoryEntry, SeriesSnapshot, StateStore};
pub use worker::{AggregationWorker, ProcessOutcome};
