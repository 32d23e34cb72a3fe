//! Visit/value accumulators attached to every node and edge.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Accumulated search statistics.
///
/// The visit count is atomic for lock-free updates; the value sum is protected
/// by a Mutex. Both only ever grow by one recorded visit at a time, so
/// concurrent `record` calls commute.
#[derive(Debug, Default)]
pub struct Statistics {
    visits: AtomicU64,
    value_sum: Mutex<f64>,
}

/// A point-in-time copy of [`Statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub visits: u64,
    pub value_sum: f64,
}

impl Statistics {
    /// Creates statistics with a prior history, used when reloading a graph.
    pub fn with_history(visits: u64, value_sum: f64) -> Self {
        Statistics {
            visits: AtomicU64::new(visits),
            value_sum: Mutex::new(value_sum),
        }
    }

    /// Counts one visit and adds `utility` to the value sum.
    pub fn record(&self, utility: f64) {
        // The counter moves under the value lock so snapshots see matching pairs.
        let mut value_sum = self.value_sum.lock();
        *value_sum += utility;
        self.visits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn visits(&self) -> u64 {
        self.visits.load(Ordering::Relaxed)
    }

    pub fn value_sum(&self) -> f64 {
        *self.value_sum.lock()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let value_sum = self.value_sum.lock();
        StatsSnapshot {
            visits: self.visits.load(Ordering::Relaxed),
            value_sum: *value_sum,
        }
    }
}

impl Clone for Statistics {
    fn clone(&self) -> Self {
        let snapshot = self.snapshot();
        Statistics::with_history(snapshot.visits, snapshot.value_sum)
    }
}

impl StatsSnapshot {
    /// Mean utility per visit, or `None` when never visited.
    pub fn average(&self) -> Option<f64> {
        if self.visits == 0 {
            None
        } else {
            Some(self.value_sum / self.visits as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_accumulates() {
        let stats = Statistics::default();
        assert_eq!(stats.snapshot().average(), None);

        stats.record(1.0);
        stats.record(-0.5);
        stats.record(0.0);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.visits, 3);
        assert!((snapshot.value_sum - 0.5).abs() < 1e-12);
        assert!((snapshot.average().unwrap() - 0.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_concurrent_records_commute() {
        let stats = Arc::new(Statistics::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record(1.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.visits(), 8000);
        assert_eq!(stats.value_sum(), 8000.0);
    }

    #[test]
    fn test_clone_copies_history() {
        let stats = Statistics::with_history(4, 2.0);
        let copy = stats.clone();
        stats.record(1.0);
        assert_eq!(copy.snapshot(), StatsSnapshot { visits: 4, value_sum: 2.0 });
        assert_eq!(stats.visits(), 5);
    }
}
