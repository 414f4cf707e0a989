//! Pipeline configuration: buffer capacities and tracked nodes.

use crate::error::CoreError;

/// Default capacity of the textual message history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 300;
/// Default capacity of each node series.
pub const DEFAULT_SERIES_CAPACITY: usize = 120;
/// Default number of instantaneous rates averaged by the rate estimator.
pub const DEFAULT_RATE_WINDOW: usize = 12;
/// Default capacity of the ingress queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Nodes tracked when `TRACKED_NODES` is not set.
pub const DEFAULT_TRACKED_NODES: [&str; 2] = ["sem-001", "sem-002"];
/// Topic prefix used when `TOPIC_PREFIX` is not set.
pub const DEFAULT_TOPIC_PREFIX: &str = "city/sem";

/// A tracked sensor node and the topic it publishes telemetry on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBinding {
    pub node_id: String,
    pub topic: String,
}

impl NodeBinding {
    /// Bind `node_id` to `<prefix>/<node_id>/telemetry`.
    pub fn with_prefix(prefix: &str, node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            topic: format!("{}/{node_id}/telemetry", prefix.trim_end_matches('/')),
        }
    }
}

/// Capacities and node bindings shared by the queue, store, and worker.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub history_capacity: usize,
    pub series_capacity: usize,
    pub rate_window: usize,
    pub queue_capacity: usize,
    pub nodes: Vec<NodeBinding>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            series_capacity: DEFAULT_SERIES_CAPACITY,
            rate_window: DEFAULT_RATE_WINDOW,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            nodes: DEFAULT_TRACKED_NODES
                .iter()
                .map(|id| NodeBinding::with_prefix(DEFAULT_TOPIC_PREFIX, id))
                .collect(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var            | Default           |
    /// |--------------------|-------------------|
    /// | `HISTORY_CAPACITY` | `300`             |
    /// | `SERIES_CAPACITY`  | `120`             |
    /// | `RATE_WINDOW`      | `12`              |
    /// | `QUEUE_CAPACITY`   | `1000`            |
    /// | `TRACKED_NODES`    | `sem-001,sem-002` |
    /// | `TOPIC_PREFIX`     | `city/sem`        |
    pub fn from_env() -> Result<Self, CoreError> {
        let prefix = std::env::var("TOPIC_PREFIX").unwrap_or_else(|_| DEFAULT_TOPIC_PREFIX.into());

        let nodes = match std::env::var("TRACKED_NODES") {
            Ok(list) => parse_node_list(&list, &prefix),
            Err(_) => DEFAULT_TRACKED_NODES
                .iter()
                .map(|id| NodeBinding::with_prefix(&prefix, id))
                .collect(),
        };

        let config = Self {
            history_capacity: env_usize("HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY)?,
            series_capacity: env_usize("SERIES_CAPACITY", DEFAULT_SERIES_CAPACITY)?,
            rate_window: env_usize("RATE_WINDOW", DEFAULT_RATE_WINDOW)?,
            queue_capacity: env_usize("QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
            nodes,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject zero capacities and an empty node list.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("HISTORY_CAPACITY", self.history_capacity),
            ("SERIES_CAPACITY", self.series_capacity),
            ("RATE_WINDOW", self.rate_window),
            ("QUEUE_CAPACITY", self.queue_capacity),
        ] {
            if value == 0 {
                return Err(CoreError::Validation(format!("{name} must be at least 1")));
            }
        }
        if self.nodes.is_empty() {
            return Err(CoreError::Validation(
                "at least one tracked node is required".into(),
            ));
        }
        Ok(())
    }

    /// Topics the connection manager subscribes to.
    pub fn topics(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.topic.clone()).collect()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.node_id.clone()).collect()
    }
}

fn parse_node_list(list: &str, prefix: &str) -> Vec<NodeBinding> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|id| NodeBinding::with_prefix(prefix, id))
        .collect()
}

fn env_usize(name: &str, default: usize) -> Result<usize, CoreError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{name} must be a non-negative integer"))),
        Err(_) => Ok(default),
    }
}
