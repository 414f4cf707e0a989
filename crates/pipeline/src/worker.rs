//! Aggregation worker: the single consumer of the ingress queue.
//!
//! For each dequeued message the worker, in order:
//!
//! 1. formats the receive time as a display label;
//! 2. prepends a [`HistoryEntry`] and updates the topic's last message;
//! 3. on monitored topics, decodes the telemetry payload (failures are
//!    logged and the message goes no further);
//! 4. hands the measurement to the [`PersistenceGateway`];
//! 5. for tracked nodes, feeds the rate estimator and appends one sample
//!    to the node's series.
//!
//! The worker is the only writer of the [`StateStore`] and owns the
//! [`RateEstimator`] outright.

use std::collections::HashSet;
use std::sync::Arc;

use ampel_core::config::PipelineConfig;
use ampel_core::rate::{series_rate, RateEstimator};
use ampel_core::telemetry::{parse_payload, RawMessage, TelemetryPayload};
use ampel_core::types::format_label;
use ampel_db::models::measurement::CreateMeasurement;
use tokio_util::sync::CancellationToken;

use crate::persistence::{record_measurement, PersistenceGateway, RecordOutcome};
use crate::queue::IngressQueue;
use crate::store::{HistoryEntry, StateStore};

/// What happened to a single processed message.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Recorded in the history only; the topic is not monitored.
    HistoryOnly,
    /// Monitored topic, but the payload could not be decoded.
    Discarded,
    /// Payload decoded and handed to persistence.
    Measured {
        node_id: String,
        /// Whether a series sample was appended (tracked node).
        sampled: bool,
        persisted: RecordOutcome,
    },
}

/// Single-threaded consumer that turns raw messages into state updates.
pub struct AggregationWorker {
    store: Arc<StateStore>,
    gateway: Arc<dyn PersistenceGateway>,
    estimator: RateEstimator,
    monitored_topics: HashSet<String>,
}

impl AggregationWorker {
    pub fn new(
        config: &PipelineConfig,
        store: Arc<StateStore>,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Self {
        Self {
            store,
            gateway,
            estimator: RateEstimator::new(config.node_ids(), config.rate_window),
            monitored_topics: config.topics().into_iter().collect(),
        }
    }

    /// Drain `queue` until `cancel` fires.
    ///
    /// Waiting for the next message is the only point where the loop
    /// blocks on anything other than the persistence call.
    pub async fn run(mut self, queue: Arc<IngressQueue>, cancel: CancellationToken) {
        tracing::info!(
            topics = self.monitored_topics.len(),
            "Aggregation worker started",
        );

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = queue.pop() => message,
            };
            self.process(message).await;
        }

        tracing::info!(pending = queue.len(), "Aggregation worker stopped");
    }

    /// Apply one message to the store, persistence, and rate estimator.
    pub async fn process(&mut self, message: RawMessage) -> ProcessOutcome {
        let label = format_label(message.received_at);

        self.store
            .record_history(HistoryEntry {
                timestamp: label.clone(),
                topic: message.topic.clone(),
                message: message.payload.clone(),
            })
            .await;

        if !self.monitored_topics.contains(&message.topic) {
            tracing::trace!(topic = %message.topic, "Message on unmonitored topic");
            return ProcessOutcome::HistoryOnly;
        }

        let payload = match parse_payload(&message.payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    topic = %message.topic,
                    error = %e,
                    raw_message = %message.payload,
                    "Discarding unparseable telemetry",
                );
                return ProcessOutcome::Discarded;
            }
        };

        let persisted =
            record_measurement(self.gateway.as_ref(), &payload.node_id, &to_measurement(&payload))
                .await;

        let sampled = if self.estimator.tracks(&payload.node_id) {
            let rate = self.estimator.observe(
                &payload.node_id,
                payload.veh_count,
                message.received_at,
            );
            self.store
                .push_sample(
                    &payload.node_id,
                    label,
                    payload.air_quality(),
                    series_rate(rate),
                )
                .await
        } else {
            tracing::debug!(node_id = %payload.node_id, "Telemetry from untracked node");
            false
        };

        ProcessOutcome::Measured {
            node_id: payload.node_id,
            sampled,
            persisted,
        }
    }
}

fn to_measurement(payload: &TelemetryPayload) -> CreateMeasurement {
    CreateMeasurement {
        mq_raw: payload.mq_raw,
        mq_pct: payload.raw_percent(),
        dist_cm: payload.dist_cm,
        veh_count: payload.veh_count,
    }
}
