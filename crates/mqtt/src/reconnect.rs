//! Reconnection timing for the broker connection.
//!
//! Two delays apply:
//!
//! - **Transient reconnects**: after a live session drops, the event loop
//!   is polled again after an exponentially growing delay
//!   ([`Backoff`]), bounded by [`ReconnectConfig::max_delay`].
//! - **Session restarts**: when a fresh connection cannot be established
//!   at all (or transient reconnects are exhausted), the manager waits the
//!   fixed [`ReconnectConfig::retry_delay`], re-resolves the broker, and
//!   starts over. This repeats forever.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Tunable parameters for reconnect timing.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first transient reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between transient attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Fixed delay before a new session after a fatal failure.
    pub retry_delay: Duration,
    /// Consecutive transient failures tolerated before the session is
    /// abandoned and the broker address re-resolved.
    pub max_transient_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            retry_delay: Duration::from_secs(5),
            max_transient_attempts: 20,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Exponential backoff state for one session.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    delay: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let delay = config.initial_delay;
        Self {
            config,
            delay,
            attempt: 0,
        }
    }

    /// Register a failure and return the delay to wait before retrying, or
    /// `None` once [`ReconnectConfig::max_transient_attempts`] is exceeded.
    pub fn next_attempt(&mut self) -> Option<Duration> {
        if self.attempt >= self.config.max_transient_attempts {
            return None;
        }
        self.attempt += 1;
        let delay = self.delay;
        self.delay = next_delay(self.delay, &self.config);
        Some(delay)
    }

    /// Forget previous failures after a successful connection.
    pub fn reset(&mut self) {
        self.delay = self.config.initial_delay;
        self.attempt = 0;
    }

    /// Failures since the last [`reset`](Self::reset).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// Returns `false` if cancelled.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
