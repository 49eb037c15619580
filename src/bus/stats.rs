use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

/// Snapshot of bus delivery counters.
///
/// - `total_published`: every publish call
/// - `total_delivered`: publish calls that matched at least one listener (not per listener)
/// - `topic_counts`: publish calls per literal topic
/// - `average_delivery_time`: running mean of the dispatch phase over delivered publishes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusStats {
    pub total_published: u64,
    pub total_delivered: u64,
    pub topic_counts: HashMap<String, u64>,
    pub average_delivery_time: Duration,
}

/// Mutable counters owned by the bus; handed out only as [`BusStats`] copies.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    stats: BusStats,
}

impl StatsRecorder {
    /// Counts one publish call to `topic`.
    pub(crate) fn record_publish(&mut self, topic: &str) {
        self.stats.total_published += 1;
        *self.stats.topic_counts.entry(topic.to_string()).or_insert(0) += 1;
    }

    /// Counts one delivered publish call and folds its dispatch time into the mean.
    pub(crate) fn record_delivery(&mut self, elapsed: Duration) {
        self.stats.total_delivered += 1;
        let n = self.stats.total_delivered as u128;
        let prev = self.stats.average_delivery_time.as_nanos();
        let next = prev * (n - 1) / n + elapsed.as_nanos() / n;
        self.stats.average_delivery_time = nanos(next);
    }

    pub(crate) fn snapshot(&self) -> BusStats {
        self.stats.clone()
    }

    pub(crate) fn reset(&mut self) {
        self.stats = BusStats::default();
    }
}

fn nanos(n: u128) -> Duration {
    let n = n.min(u128::from(u64::MAX)) as u64;
    Duration::from_nanos(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_mean() {
        let mut rec = StatsRecorder::default();
        rec.record_delivery(Duration::from_millis(10));
        rec.record_delivery(Duration::from_millis(30));
        rec.record_delivery(Duration::from_millis(20));
        let snap = rec.snapshot();
        assert_eq!(snap.total_delivered, 3);
        let avg = snap.average_delivery_time.as_micros();
        assert!((19_990..=20_010).contains(&avg), "avg={avg}");
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut rec = StatsRecorder::default();
        rec.record_publish("task:completed");
        rec.record_delivery(Duration::from_millis(1));
        rec.reset();
        assert_eq!(rec.snapshot(), BusStats::default());
    }
}
