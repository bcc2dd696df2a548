use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for the supervisor store.
pub struct StorageMetrics {
    pub events_appended: AtomicU64,
    pub metrics_appended: AtomicU64,
    pub evidence_appended: AtomicU64,
    pub reads: AtomicU64,
    pub pruned: AtomicU64,
    pub flushes: AtomicU64,
    pub errors: AtomicU64,
}

impl StorageMetrics {
    pub fn new() -> Self {
        Self {
            events_appended: AtomicU64::new(0),
            metrics_appended: AtomicU64::new(0),
            evidence_appended: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            pruned: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StorageMetricsSnapshot {
        StorageMetricsSnapshot {
            events_appended: self.events_appended.load(Ordering::Relaxed),
            metrics_appended: self.metrics_appended.load(Ordering::Relaxed),
            evidence_appended: self.evidence_appended.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for StorageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageMetricsSnapshot {
    pub events_appended: u64,
    pub metrics_appended: u64,
    pub evidence_appended: u64,
    pub reads: u64,
    pub pruned: u64,
    pub flushes: u64,
    pub errors: u64,
}
