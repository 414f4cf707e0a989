//! Long-lived broker connection manager.
//!
//! [`ConnectionManager::start`] spawns one task that keeps a subscription
//! to the telemetry topics alive for the lifetime of the process: connect,
//! process events, and on a fatal failure wait
//! [`ReconnectConfig::retry_delay`] and start a fresh session. The current
//! [`ConnectionState`] is observable through [`ConnectionManager::state`].

use std::sync::Arc;
use std::time::Duration;

use ampel_pipeline::IngressQueue;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::BrokerClient;
use crate::processor::{process_events, SessionEnd};
use crate::reconnect::{sleep_or_cancel, ReconnectConfig};
use crate::state::{ConnectionState, StateReporter};

/// How long [`ConnectionManager::shutdown`] waits for the task to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the background connection task.
pub struct ConnectionManager {
    state: watch::Receiver<ConnectionState>,
    task_handle: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Spawn the connection task.
    ///
    /// The task stops when `cancel` (or [`shutdown`](Self::shutdown)) fires.
    pub fn start(
        client: BrokerClient,
        queue: Arc<IngressQueue>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (reporter, state) = StateReporter::new();
        let task_cancel = cancel.child_token();
        let loop_cancel = task_cancel.clone();

        let task_handle = tokio::spawn(async move {
            tracing::info!(
                host = %client.config().host,
                port = client.config().port,
                "Starting MQTT connection task",
            );
            run_connection_loop(&client, &queue, &reporter, &reconnect, &loop_cancel).await;
            tracing::info!("MQTT connection task exited");
        });

        Self {
            state,
            task_handle,
            cancel: task_cancel,
        }
    }

    /// Receiver for the live connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Stop the connection task and wait briefly for it to exit.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down MQTT connection manager");
        self.cancel.cancel();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.task_handle)
            .await
            .is_err()
        {
            tracing::warn!("MQTT connection task did not exit in time");
        }
    }
}

/// Core connection loop: connect -> process events -> retry.
///
/// Never gives up; runs until `cancel` is triggered.
pub async fn run_connection_loop(
    client: &BrokerClient,
    queue: &Arc<IngressQueue>,
    reporter: &StateReporter,
    reconnect: &ReconnectConfig,
    cancel: &CancellationToken,
) {
    let mut sessions: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        sessions += 1;
        let mut session = client.connect().await;

        match process_events(client, &mut session, queue, reporter, reconnect, cancel).await {
            SessionEnd::Cancelled => break,
            SessionEnd::ConnectFailed(e) | SessionEnd::SubscribeFailed(e) => {
                tracing::warn!(
                    session = sessions,
                    error = %e,
                    retry_in_secs = reconnect.retry_delay.as_secs(),
                    "MQTT session failed, retrying",
                );
            }
            SessionEnd::Exhausted => {
                tracing::warn!(
                    session = sessions,
                    retry_in_secs = reconnect.retry_delay.as_secs(),
                    "MQTT session abandoned, retrying with fresh address",
                );
            }
        }

        if !sleep_or_cancel(reconnect.retry_delay, cancel).await {
            break;
        }
    }

    reporter.set(ConnectionState::Disconnected);
}
