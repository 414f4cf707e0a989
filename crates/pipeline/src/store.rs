//! In-memory state read by the dashboard.
//!
//! [`StateStore`] holds three bounded views of the ingested telemetry:
//!
//! - the textual message history, newest first;
//! - the last message per known topic;
//! - one [`SeriesSnapshot`]-shaped series per tracked node, oldest first.
//!
//! All three live behind a single `RwLock` so that readers always observe
//! a consistent snapshot. Only the [`AggregationWorker`](crate::worker::AggregationWorker)
//! writes; the mutating methods are crate-private.

use std::collections::{BTreeMap, HashMap};

use ampel_core::buffer::BoundedBuffer;
use ampel_core::config::PipelineConfig;
use serde::Serialize;
use tokio::sync::RwLock;

/// One line of the message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Local receive time, formatted for display.
    pub timestamp: String,
    pub topic: String,
    pub message: String,
}

/// Copy of a node series, suitable for serialization.
///
/// The three vectors always have equal length; index `i` of each refers
/// to the same processed message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeriesSnapshot {
    pub labels: Vec<String>,
    pub air_quality: Vec<Option<i64>>,
    pub vehicle_rate: Vec<Option<i64>>,
}

impl SeriesSnapshot {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Lockstep series for one node.
#[derive(Debug)]
struct NodeSeries {
    labels: BoundedBuffer<String>,
    air_quality: BoundedBuffer<Option<i64>>,
    vehicle_rate: BoundedBuffer<Option<i64>>,
}

impl NodeSeries {
    fn new(capacity: usize) -> Self {
        Self {
            labels: BoundedBuffer::new(capacity),
            air_quality: BoundedBuffer::new(capacity),
            vehicle_rate: BoundedBuffer::new(capacity),
        }
    }

    fn push(&mut self, label: String, air_quality: Option<i64>, vehicle_rate: Option<i64>) {
        self.labels.push_back(label);
        self.air_quality.push_back(air_quality);
        self.vehicle_rate.push_back(vehicle_rate);
    }

    fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            labels: self.labels.to_vec(),
            air_quality: self.air_quality.to_vec(),
            vehicle_rate: self.vehicle_rate.to_vec(),
        }
    }
}

#[derive(Debug)]
struct StoreInner {
    history: BoundedBuffer<HistoryEntry>,
    /// Keyed by every known topic; `None` until the first message arrives.
    last_by_topic: HashMap<String, Option<HistoryEntry>>,
    series: BTreeMap<String, NodeSeries>,
}

/// Shared, bounded telemetry state.
///
/// Designed to be wrapped in `Arc` and shared between the worker and the
/// HTTP handlers.
#[derive(Debug)]
pub struct StateStore {
    inner: RwLock<StoreInner>,
}

impl StateStore {
    /// Create an empty store sized by `config`, with one series per tracked
    /// node and one last-message slot per node topic.
    pub fn new(config: &PipelineConfig) -> Self {
        let last_by_topic = config
            .nodes
            .iter()
            .map(|n| (n.topic.clone(), None))
            .collect();
        let series = config
            .nodes
            .iter()
            .map(|n| (n.node_id.clone(), NodeSeries::new(config.series_capacity)))
            .collect();

        Self {
            inner: RwLock::new(StoreInner {
                history: BoundedBuffer::new(config.history_capacity),
                last_by_topic,
                series,
            }),
        }
    }

    // ---- queries ----

    /// Message history, newest first.
    pub async fn list_history(&self) -> Vec<HistoryEntry> {
        self.inner.read().await.history.to_vec()
    }

    /// Most recent message on `topic`, if the topic is known and has
    /// received anything.
    pub async fn peek_last(&self, topic: &str) -> Option<HistoryEntry> {
        self.inner
            .read()
            .await
            .last_by_topic
            .get(topic)
            .cloned()
            .flatten()
    }

    /// Snapshot of every tracked node's series, keyed by node id.
    pub async fn series(&self) -> BTreeMap<String, SeriesSnapshot> {
        self.inner
            .read()
            .await
            .series
            .iter()
            .map(|(id, s)| (id.clone(), s.snapshot()))
            .collect()
    }

    /// Number of entries currently in the history.
    pub async fn history_len(&self) -> usize {
        self.inner.read().await.history.len()
    }

    // ---- writer operations (aggregation worker only) ----

    /// Prepend `entry` to the history and, if its topic is known, make it
    /// the topic's last message.
    pub(crate) async fn record_history(&self, entry: HistoryEntry) {
        let mut inner = self.inner.write().await;
        if let Some(slot) = inner.last_by_topic.get_mut(&entry.topic) {
            *slot = Some(entry.clone());
        }
        inner.history.push_front(entry);
    }

    /// Append one sample to `node_id`'s series.
    ///
    /// Returns `false` if the node is not tracked.
    pub(crate) async fn push_sample(
        &self,
        node_id: &str,
        label: String,
        air_quality: Option<i64>,
        vehicle_rate: Option<i64>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        match inner.series.get_mut(node_id) {
            Some(series) => {
                series.push(label, air_quality, vehicle_rate);
                true
            }
            None => false,
        }
    }
}
