//! Event loop for a single broker session.
//!
//! [`process_events`] polls the rumqttc event loop, subscribes on every
//! `ConnAck`, and forwards each incoming publish onto the ingress queue.
//! Drops after a successful handshake are retried in place with
//! exponential backoff; a failure before the first handshake ends the
//! session so the caller can re-resolve the broker.

use std::sync::Arc;

use ampel_core::telemetry::RawMessage;
use ampel_pipeline::IngressQueue;
use chrono::Utc;
use rumqttc::{Event, Packet};
use tokio_util::sync::CancellationToken;

use crate::client::{BrokerClient, BrokerError, BrokerSession};
use crate::reconnect::{sleep_or_cancel, Backoff, ReconnectConfig};
use crate::state::{ConnectionState, StateReporter};

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Shutdown was requested.
    Cancelled,
    /// No handshake ever completed on this session.
    ConnectFailed(BrokerError),
    /// The subscribe request could not be issued after a handshake.
    SubscribeFailed(BrokerError),
    /// Transient reconnect attempts ran out.
    Exhausted,
}

/// Drive `session` until it ends, pushing publishes onto `queue`.
pub async fn process_events(
    broker: &BrokerClient,
    session: &mut BrokerSession,
    queue: &Arc<IngressQueue>,
    reporter: &StateReporter,
    reconnect: &ReconnectConfig,
    cancel: &CancellationToken,
) -> SessionEnd {
    let filters = broker.subscribe_filters();
    let mut backoff = Backoff::new(reconnect.clone());
    let mut handshake_seen = false;

    reporter.set(ConnectionState::Connecting);

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                reporter.set(ConnectionState::Disconnected);
                return SessionEnd::Cancelled;
            }
            event = session.event_loop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                handshake_seen = true;
                backoff.reset();
                tracing::info!(client_id = %session.client_id, "Connected to MQTT broker");

                if let Err(e) = session.client.try_subscribe_many(filters.clone()) {
                    tracing::error!(error = %e, "Failed to issue subscribe request");
                    reporter.set(ConnectionState::Disconnected);
                    return SessionEnd::SubscribeFailed(e.into());
                }
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => {
                tracing::info!(topics = ?broker.topics(), "Subscribed to telemetry topics");
                reporter.set(ConnectionState::Subscribed);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::trace!(topic = %publish.topic, bytes = publish.payload.len(), "Publish received");
                queue.push(RawMessage::from_bytes(
                    publish.topic,
                    &publish.payload,
                    Utc::now(),
                ));
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("Broker sent disconnect");
            }
            Ok(_) => {}
            Err(e) => {
                reporter.set(ConnectionState::Disconnected);

                if !handshake_seen {
                    tracing::warn!(error = %e, "Could not connect to MQTT broker");
                    return SessionEnd::ConnectFailed(e.into());
                }

                let Some(delay) = backoff.next_attempt() else {
                    tracing::warn!(
                        attempts = backoff.attempt(),
                        error = %e,
                        "Reconnect attempts exhausted, abandoning session",
                    );
                    return SessionEnd::Exhausted;
                };

                tracing::warn!(
                    attempt = backoff.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "MQTT connection lost, reconnecting",
                );

                if !sleep_or_cancel(delay, cancel).await {
                    return SessionEnd::Cancelled;
                }
                reporter.set(ConnectionState::Connecting);
            }
        }
    }
}
