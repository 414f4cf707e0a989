//! Broker configuration and MQTT client construction.
//!
//! [`BrokerClient`] holds the broker coordinates and the topics to
//! subscribe to. Each call to [`BrokerClient::connect`] resolves the broker
//! address afresh and builds a new rumqttc client/event-loop pair; the
//! network connection itself is opened lazily by the first event-loop poll.

use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS, SubscribeFilter};

/// Capacity of the rumqttc request channel between client and event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 16;

/// Brokers reject keep-alives shorter than this.
const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// Broker coordinates loaded from the environment.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    /// Client ids are `<prefix>-<random>`.
    pub client_id_prefix: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "broker.mqtt.cool".into(),
            port: 1883,
            keep_alive: Duration::from_secs(60),
            client_id_prefix: "ampel".into(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default            |
    /// |-------------------------|--------------------|
    /// | `MQTT_HOST`             | `broker.mqtt.cool` |
    /// | `MQTT_PORT`             | `1883`             |
    /// | `MQTT_KEEP_ALIVE_SECS`  | `60`               |
    /// | `MQTT_CLIENT_ID_PREFIX` | `ampel`            |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("MQTT_HOST").unwrap_or(defaults.host);

        let port: u16 = std::env::var("MQTT_PORT")
            .map(|v| v.parse().expect("MQTT_PORT must be a valid u16"))
            .unwrap_or(defaults.port);

        let keep_alive_secs: u64 = std::env::var("MQTT_KEEP_ALIVE_SECS")
            .map(|v| v.parse().expect("MQTT_KEEP_ALIVE_SECS must be a valid u64"))
            .unwrap_or(defaults.keep_alive.as_secs());

        let client_id_prefix =
            std::env::var("MQTT_CLIENT_ID_PREFIX").unwrap_or(defaults.client_id_prefix);

        Self {
            host,
            port,
            keep_alive: Duration::from_secs(keep_alive_secs.max(MIN_KEEP_ALIVE_SECS)),
            client_id_prefix,
        }
    }
}

/// Resolve `host` to an IPv4 address string.
///
/// Falls back to the hostname itself when resolution fails or yields no
/// IPv4 address, leaving the final lookup to the MQTT client.
pub async fn resolve_host(host: &str, port: u16) -> String {
    match tokio::net::lookup_host((host, port)).await {
        Ok(addrs) => {
            let mut addrs = addrs;
            match addrs.find(|a| a.is_ipv4()) {
                Some(addr) => addr.ip().to_string(),
                None => host.to_string(),
            }
        }
        Err(e) => {
            tracing::warn!(host, error = %e, "Broker address resolution failed, using hostname");
            host.to_string()
        }
    }
}

/// Connection handle for the telemetry broker.
#[derive(Debug, Clone)]
pub struct BrokerClient {
    config: BrokerConfig,
    topics: Vec<String>,
}

/// A client/event-loop pair for one session, plus the id it connects with.
pub struct BrokerSession {
    pub client_id: String,
    /// Address the session connects to (resolved IPv4 or hostname).
    pub address: String,
    pub client: AsyncClient,
    pub event_loop: EventLoop,
}

impl BrokerClient {
    pub fn new(config: BrokerConfig, topics: Vec<String>) -> Self {
        Self { config, topics }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Subscription filters for every topic, at-most-once.
    pub fn subscribe_filters(&self) -> Vec<SubscribeFilter> {
        self.topics
            .iter()
            .map(|t| SubscribeFilter::new(t.clone(), QoS::AtMostOnce))
            .collect()
    }

    /// Build the options for a session against `address`.
    pub fn options(&self, address: &str, client_id: &str) -> MqttOptions {
        let mut options = MqttOptions::new(client_id, address, self.config.port);
        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(true);
        options
    }

    /// Resolve the broker and prepare a new session.
    pub async fn connect(&self) -> BrokerSession {
        let address = resolve_host(&self.config.host, self.config.port).await;
        let client_id = self.new_client_id();
        let (client, event_loop) =
            AsyncClient::new(self.options(&address, &client_id), REQUEST_CHANNEL_CAPACITY);

        tracing::info!(
            host = %self.config.host,
            address = %address,
            port = self.config.port,
            client_id = %client_id,
            "Connecting to MQTT broker",
        );

        BrokerSession {
            client_id,
            address,
            client,
            event_loop,
        }
    }

    fn new_client_id(&self) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", self.config.client_id_prefix, &suffix[..12])
    }
}

/// Errors that end a broker session.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The network connection or MQTT handshake failed.
    #[error("Connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    /// The subscribe request could not be queued.
    #[error("Subscribe error: {0}")]
    Subscribe(#[from] rumqttc::ClientError),
}
