//! Smoothed vehicle throughput from cumulative counters.
//!
//! Sensor nodes report a monotonically increasing vehicle count. The
//! estimator differences successive readings per node into an
//! instantaneous rate (vehicles per minute) and returns the mean of the
//! most recent rates.
//!
//! Clock skew (`dt <= 0`) and counter resets (`dc < 0`) are not errors:
//! the reading becomes the new baseline and no rate is produced. A count
//! delta that does not fit in an `i64` is handled the same way.
//!
//! Rounding is half-to-even throughout.

use std::collections::HashMap;

use crate::buffer::BoundedBuffer;
use crate::types::Timestamp;

/// Seconds per rate unit: rates are expressed in events per minute.
const RATE_PERIOD_SECS: f64 = 60.0;

/// Per-node estimator state.
#[derive(Debug, Clone)]
struct NodeRateState {
    last_count: Option<i64>,
    last_ts: Option<Timestamp>,
    recent_rates: BoundedBuffer<f64>,
}

impl NodeRateState {
    fn new(window: usize) -> Self {
        Self {
            last_count: None,
            last_ts: None,
            recent_rates: BoundedBuffer::new(window),
        }
    }

    fn rebase(&mut self, count: i64, at: Timestamp) {
        self.last_count = Some(count);
        self.last_ts = Some(at);
    }
}

/// Rolling-average rate estimator over a fixed set of tracked nodes.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    nodes: HashMap<String, NodeRateState>,
}

impl RateEstimator {
    /// Create an estimator for `node_ids`, averaging over the last `window`
    /// computed rates per node.
    pub fn new<I, S>(node_ids: I, window: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes = node_ids
            .into_iter()
            .map(|id| (id.into(), NodeRateState::new(window)))
            .collect();
        Self { nodes }
    }

    /// Whether `node_id` is tracked by this estimator.
    pub fn tracks(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Feed a reading and return the smoothed rate rounded to one decimal.
    ///
    /// Returns `None` for untracked nodes, for the first reading of a node,
    /// and for readings that go backwards in time or count.
    pub fn observe(&mut self, node_id: &str, count: i64, at: Timestamp) -> Option<f64> {
        let state = self.nodes.get_mut(node_id)?;

        let (Some(last_count), Some(last_ts)) = (state.last_count, state.last_ts) else {
            state.rebase(count, at);
            return None;
        };

        let (Some(count_diff), Some(micros)) = (
            count.checked_sub(last_count),
            (at - last_ts).num_microseconds(),
        ) else {
            state.rebase(count, at);
            return None;
        };
        let time_diff = micros as f64 / 1_000_000.0;

        if time_diff <= 0.0 || count_diff < 0 {
            state.rebase(count, at);
            return None;
        }

        let rate = (count_diff as f64 / time_diff) * RATE_PERIOD_SECS;
        state.recent_rates.push_back(rate);
        state.rebase(count, at);

        let n = state.recent_rates.len();
        let avg = state.recent_rates.iter().sum::<f64>() / n as f64;
        Some((avg * 10.0).round_ties_even() / 10.0)
    }

    /// Number of rates currently held for `node_id`.
    pub fn window_len(&self, node_id: &str) -> usize {
        self.nodes
            .get(node_id)
            .map_or(0, |s| s.recent_rates.len())
    }
}

/// Convert a smoothed rate into the integer stored in a node series.
///
/// Negative values are not expected from [`RateEstimator::observe`] but are
/// floored at zero all the same.
pub fn series_rate(rate: Option<f64>) -> Option<i64> {
    rate.map(|r| r.max(0.0).round_ties_even() as i64)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn estimator() -> RateEstimator {
        RateEstimator::new(["sem-001", "sem-002"], 12)
    }

    #[test]
    fn first_reading_sets_baseline() {
        let mut est = estimator();
        assert_eq!(est.observe("sem-001", 10, at(0)), None);
        assert_eq!(est.window_len("sem-001"), 0);
    }

    #[test]
    fn sixty_vehicles_in_sixty_seconds_is_sixty_per_minute() {
        let mut est = estimator();
        est.observe("sem-001", 10, at(0));
        assert_eq!(est.observe("sem-001", 70, at(60)), Some(60.0));
    }

    #[test]
    fn counter_regression_rebases_without_rate() {
        let mut est = estimator();
        est.observe("sem-001", 10, at(0));
        assert_eq!(est.observe("sem-001", 5, at(60)), None);
        assert_eq!(est.window_len("sem-001"), 0);

        // The regressed reading is the new baseline.
        assert_eq!(est.observe("sem-001", 8, at(120)), Some(3.0));
    }

    #[test]
    fn non_increasing_time_rebases_without_rate() {
        let mut est = estimator();
        est.observe("sem-002", 10, at(60));
        assert_eq!(est.observe("sem-002", 20, at(60)), None);
        assert_eq!(est.observe("sem-002", 30, at(30)), None);
        assert_eq!(est.window_len("sem-002"), 0);
        assert_eq!(est.observe("sem-002", 40, at(90)), Some(10.0));
    }

    #[test]
    fn rolling_average_covers_only_last_window() {
        let mut est = estimator();
        est.observe("sem-001", 0, at(0));

        // First interval: 120 vehicles/min. The next twelve: 60/min.
        let mut count = 120;
        est.observe("sem-001", count, at(60));
        let mut last = None;
        for i in 2..=13 {
            count += 60;
            last = est.observe("sem-001", count, at(60 * i));
        }

        // Thirteen computed rates; the 120/min one has been evicted.
        assert_eq!(est.window_len("sem-001"), 12);
        assert_eq!(last, Some(60.0));
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        let mut est = estimator();
        est.observe("sem-001", 0, at(0));
        est.observe("sem-001", 1, at(60)); // 1.0
        let avg = est.observe("sem-001", 3, at(120)); // 2.0 -> mean 1.5
        assert_eq!(avg, Some(1.5));
        let avg = est.observe("sem-001", 4, at(180)); // 1.0 -> mean 1.333..
        assert_eq!(avg, Some(1.3));
    }

    #[test]
    fn one_decimal_ties_round_to_even() {
        let mut est = estimator();
        est.observe("sem-001", 0, at(0));
        est.observe("sem-001", 0, at(120)); // 0.0
        let avg = est.observe("sem-001", 1, at(240)); // 0.5 -> mean 0.25
        assert_eq!(avg, Some(0.2));
    }

    #[test]
    fn half_average_lands_on_even_series_value() {
        let mut est = estimator();
        est.observe("sem-001", 0, at(0));
        est.observe("sem-001", 2, at(60)); // 2.0
        let avg = est.observe("sem-001", 5, at(120)); // 3.0 -> mean 2.5
        assert_eq!(avg, Some(2.5));
        assert_eq!(series_rate(avg), Some(2));
    }

    #[test]
    fn sub_millisecond_interval_still_yields_rate() {
        let mut est = estimator();
        est.observe("sem-001", 0, at(0));
        let avg = est.observe("sem-001", 1, at(0) + Duration::microseconds(500));
        assert_eq!(avg, Some(120_000.0));
    }

    #[test]
    fn extreme_counts_rebase_without_panicking() {
        let mut est = estimator();
        est.observe("sem-001", i64::MIN, at(0));
        assert_eq!(est.observe("sem-001", i64::MAX, at(60)), None);
        assert_eq!(est.window_len("sem-001"), 0);

        // i64::MAX is the new baseline.
        assert_eq!(est.observe("sem-001", i64::MAX, at(120)), Some(0.0));
        assert_eq!(est.observe("sem-001", i64::MIN, at(180)), None);
    }

    #[test]
    fn nodes_are_independent() {
        let mut est = estimator();
        est.observe("sem-001", 0, at(0));
        est.observe("sem-002", 100, at(0));
        assert_eq!(est.observe("sem-001", 30, at(60)), Some(30.0));
        assert_eq!(est.observe("sem-002", 110, at(60)), Some(10.0));
    }

    #[test]
    fn untracked_node_yields_nothing() {
        let mut est = estimator();
        assert!(!est.tracks("sem-999"));
        assert_eq!(est.observe("sem-999", 1, at(0)), None);
        assert_eq!(est.observe("sem-999", 2, at(60)), None);
    }

    #[test]
    fn series_rate_floors_and_rounds_half_to_even() {
        assert_eq!(series_rate(Some(59.6)), Some(60));
        assert_eq!(series_rate(Some(-4.2)), Some(0));
        assert_eq!(series_rate(Some(0.5)), Some(0));
        assert_eq!(series_rate(Some(2.5)), Some(2));
        assert_eq!(series_rate(Some(3.5)), Some(4));
        assert_eq!(series_rate(None), None);
    }
}
