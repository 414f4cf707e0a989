//! Broker connection state machine.
//!
//! ```text
//! Disconnected --connect--> Connecting --ConnAck + subscribe--> Subscribed
//!      ^                        |                                   |
//!      +--------- error --------+------------- error ---------------+
//! ```
//!
//! The current state is published on a `watch` channel so the HTTP layer
//! can report it without touching the connection.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// Lifecycle of the subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write side of the state channel, owned by the connection task.
#[derive(Debug)]
pub struct StateReporter {
    tx: watch::Sender<ConnectionState>,
}

impl StateReporter {
    /// Create a reporter starting in [`ConnectionState::Disconnected`],
    /// along with a receiver for observers.
    pub fn new() -> (Self, watch::Receiver<ConnectionState>) {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        (Self { tx }, rx)
    }

    /// Move to `next`, logging the transition. No-op if unchanged.
    pub fn set(&self, next: ConnectionState) {
        let previous = self.tx.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "Broker connection state changed");
        }
    }

    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Another receiver for the same state.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let (reporter, rx) = StateReporter::new();
        assert_eq!(reporter.current(), ConnectionState::Disconnected);
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);
    }

    #[test]
    fn transitions_are_visible_to_receivers() {
        let (reporter, rx) = StateReporter::new();
        reporter.set(ConnectionState::Connecting);
        reporter.set(ConnectionState::Subscribed);
        assert_eq!(*rx.borrow(), ConnectionState::Subscribed);

        let late = reporter.subscribe();
        reporter.set(ConnectionState::Disconnected);
        assert_eq!(*late.borrow(), ConnectionState::Disconnected);
    }

    #[test]
    fn set_survives_dropped_receivers() {
        let (reporter, rx) = StateReporter::new();
        drop(rx);
        reporter.set(ConnectionState::Connecting);
        assert_eq!(reporter.current(), ConnectionState::Connecting);
    }

    #[test]
    fn displays_lowercase_names() {
        assert_eq!(ConnectionState::Subscribed.to_string(), "subscribed");
        assert_eq!(ConnectionState::Connecting.as_str(), "connecting");
    }
}
