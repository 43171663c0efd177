//! In-process metrics for the partition consumer.
//!
//! Plain atomic counters, collected in-memory; the runner logs a snapshot
//! periodically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Collected metrics for all partition consumers in the process.
#[derive(Debug, Default)]
pub struct Metrics {
    // Delivery
    pub records_delivered: Counter,
    pub batches_fetched: Counter,
    pub fetch_errors: Counter,

    // Offsets
    pub commits: Counter,
    pub commit_failures: Counter,
    pub offset_resets: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            records_delivered: self.records_delivered.get(),
            batches_fetched: self.batches_fetched.get(),
            fetch_errors: self.fetch_errors.get(),
            commits: self.commits.get(),
            commit_failures: self.commit_failures.get(),
            offset_resets: self.offset_resets.get(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub records_delivered: u64,
    pub batches_fetched: u64,
    pub fetch_errors: u64,
    pub commits: u64,
    pub commit_failures: u64,
    pub offset_resets: u64,
}

/// Global metrics instance.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Returns the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
