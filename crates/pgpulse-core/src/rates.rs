//! Per-second rates from consecutive snapshots.
//!
//! Only metrics whose dimension is [`Algorithm::Incremental`] get a rate;
//! gauges are reported by the snapshot itself.
//!
//! [`Algorithm::Incremental`]: crate::collector::Algorithm::Incremental

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::snapshot::Snapshot;

/// Default maximum gap between two samples for a rate to be computed.
/// Allows a few missed ticks at the daemon's default 10 s interval.
pub const DEFAULT_MAX_RATE_GAP: Duration = Duration::from_secs(65);

/// Compute i64 delta, returning `None` on counter regression (stats reset).
pub fn di64(curr: i64, prev: i64) -> Option<i64> {
    (curr >= prev).then_some(curr - prev)
}

/// Keeps the previous snapshot and turns the next one into rates.
#[derive(Debug, Clone)]
pub struct RateTracker {
    prev: Option<(Instant, Snapshot)>,
    max_gap: Duration,
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RATE_GAP)
    }
}

impl RateTracker {
    pub fn new(max_gap: Duration) -> Self {
        Self {
            prev: None,
            max_gap,
        }
    }

    /// Drops the stored sample; the next update yields no rates.
    pub fn reset(&mut self) {
        self.prev = None;
    }

    /// Stores `snapshot` and returns per-second rates against the previous
    /// sample for names where `is_incremental` holds.
    ///
    /// Returns an empty map for the first sample, when the gap is zero or
    /// longer than `max_gap`. Names missing from the previous sample or
    /// whose counter went backwards are omitted.
    pub fn update<F>(
        &mut self,
        now: Instant,
        snapshot: &Snapshot,
        is_incremental: F,
    ) -> BTreeMap<String, f64>
    where
        F: Fn(&str) -> bool,
    {
        let mut rates = BTreeMap::new();

        if let Some((prev_at, prev)) = &self.prev {
            let dt = now.saturating_duration_since(*prev_at);
            if !dt.is_zero() && dt <= self.max_gap {
                let secs = dt.as_secs_f64();
                for (name, curr) in snapshot.iter() {
                    if !is_incremental(name) {
                        continue;
                    }
                    if let Some(prev_value) = prev.get(name)
                        && let Some(delta) = di64(curr, prev_value)
                    {
                        rates.insert(name.to_string(), delta as f64 / secs);
                    }
                }
            }
        }

        self.prev = Some((now, snapshot.clone()));
        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, i64)]) -> Snapshot {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    fn all(_: &str) -> bool {
        true
    }

    #[test]
    fn test_di64_regression() {
        assert_eq!(di64(10, 4), Some(6));
        assert_eq!(di64(4, 4), Some(0));
        assert_eq!(di64(3, 4), None);
    }

    #[test]
    fn first_sample_has_no_rates() {
        let mut tracker = RateTracker::default();
        let rates = tracker.update(Instant::now(), &snapshot(&[("xact_commit", 10)]), all);
        assert!(rates.is_empty());
    }

    #[test]
    fn rate_is_delta_per_second() {
        let mut tracker = RateTracker::default();
        let t0 = Instant::now();
        tracker.update(t0, &snapshot(&[("xact_commit", 100)]), all);

        let rates = tracker.update(
            t0 + Duration::from_secs(10),
            &snapshot(&[("xact_commit", 150)]),
            all,
        );
        assert_eq!(rates.get("xact_commit"), Some(&5.0));
    }

    #[test]
    fn gauges_are_skipped() {
        let mut tracker = RateTracker::default();
        let t0 = Instant::now();
        let is_counter = |name: &str| name != "numbackends";
        tracker.update(t0, &snapshot(&[("numbackends", 1), ("deadlocks", 0)]), is_counter);

        let rates = tracker.update(
            t0 + Duration::from_secs(1),
            &snapshot(&[("numbackends", 5), ("deadlocks", 2)]),
            is_counter,
        );
        assert!(!rates.contains_key("numbackends"));
        assert_eq!(rates.get("deadlocks"), Some(&2.0));
    }

    #[test]
    fn stats_reset_yields_no_rate() {
        let mut tracker = RateTracker::default();
        let t0 = Instant::now();
        tracker.update(t0, &snapshot(&[("xact_commit", 1000)]), all);

        let rates = tracker.update(
            t0 + Duration::from_secs(10),
            &snapshot(&[("xact_commit", 3)]),
            all,
        );
        assert!(rates.is_empty());

        // The reset sample becomes the new baseline.
        let rates = tracker.update(
            t0 + Duration::from_secs(20),
            &snapshot(&[("xact_commit", 23)]),
            all,
        );
        assert_eq!(rates.get("xact_commit"), Some(&2.0));
    }

    #[test]
    fn long_gap_yields_no_rate() {
        let mut tracker = RateTracker::new(Duration::from_secs(30));
        let t0 = Instant::now();
        tracker.update(t0, &snapshot(&[("xact_commit", 0)]), all);

        let rates = tracker.update(
            t0 + Duration::from_secs(31),
            &snapshot(&[("xact_commit", 31)]),
            all,
        );
        assert!(rates.is_empty());
    }

    #[test]
    fn new_names_have_no_rate_until_second_sample() {
        let mut tracker = RateTracker::default();
        let t0 = Instant::now();
        tracker.update(t0, &snapshot(&[("a", 1)]), all);

        let rates = tracker.update(
            t0 + Duration::from_secs(1),
            &snapshot(&[("a", 2), ("b", 7)]),
            all,
        );
        assert_eq!(rates.len(), 1);
        assert!(rates.contains_key("a"));
    }
}
