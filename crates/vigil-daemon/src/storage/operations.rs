use super::{DependencyCheck, DependencyHealth, EvidenceRecord, PruneReport, SupervisorStorage, MAX_BATCH_SIZE};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sled::{Batch, IVec, Tree};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use vigil_types::{EventRecord, MetricKind, MetricRecord, VigilError, VigilResult};

const KEY_LEN: usize = 16;

fn timestamp_prefix(timestamp: DateTime<Utc>) -> [u8; 8] {
    (timestamp.timestamp_millis().max(0) as u64).to_be_bytes()
}

fn cutoff(window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl SupervisorStorage {
    /// Keys sort chronologically; the sled id suffix keeps equal timestamps distinct.
    fn record_key(&self, timestamp: DateTime<Utc>) -> VigilResult<[u8; KEY_LEN]> {
        let sequence = self
            .db
            .generate_id()
            .map_err(|e| VigilError::Storage(format!("Failed to generate key: {}", e)))?;

        let mut key = [0u8; KEY_LEN];
        key[..8].copy_from_slice(&timestamp_prefix(timestamp));
        key[8..].copy_from_slice(&sequence.to_be_bytes());
        Ok(key)
    }

    fn append<T: Serialize>(
        &self,
        tree: &Tree,
        timestamp: DateTime<Utc>,
        value: &T,
        counter: &AtomicU64,
    ) -> VigilResult<()> {
        let key = self.record_key(timestamp)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| VigilError::Serialization(format!("Failed to serialize record: {}", e)))?;

        tree.insert(key, bytes).map_err(|e| {
            self.metrics.record_error();
            VigilError::Storage(format!("Failed to append record: {}", e))
        })?;

        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn decode<T: DeserializeOwned>(&self, value: &IVec) -> VigilResult<T> {
        self.metrics.reads.fetch_add(1, Ordering::Relaxed);
        serde_json::from_slice(value).map_err(|e| {
            self.metrics.record_error();
            VigilError::Serialization(format!("Failed to deserialize record: {}", e))
        })
    }

    fn scan_since<T: DeserializeOwned>(&self, tree: &Tree, since: DateTime<Utc>) -> VigilResult<Vec<T>> {
        let mut results = Vec::new();

        for entry in tree.range(timestamp_prefix(since)..) {
            let (_, value) = entry.map_err(|e| {
                self.metrics.record_error();
                VigilError::Storage(format!("Failed to iterate store: {}", e))
            })?;
            results.push(self.decode(&value)?);
        }

        Ok(results)
    }

    fn latest<T: DeserializeOwned>(&self, tree: &Tree, limit: usize) -> VigilResult<Vec<T>> {
        let mut results = Vec::with_capacity(limit.min(1024));

        for entry in tree.iter().rev().take(limit) {
            let (_, value) = entry.map_err(|e| {
                self.metrics.record_error();
                VigilError::Storage(format!("Failed to iterate store: {}", e))
            })?;
            results.push(self.decode(&value)?);
        }

        results.reverse();
        Ok(results)
    }

    pub fn append_event(&self, event: &EventRecord) -> VigilResult<()> {
        self.append(&self.events, event.timestamp, event, &self.metrics.events_appended)
    }

    pub fn append_metric(&self, metric: &MetricRecord) -> VigilResult<()> {
        self.append(&self.metrics_tree, metric.timestamp, metric, &self.metrics.metrics_appended)
    }

    pub fn record_evidence(&self, record: &EvidenceRecord) -> VigilResult<()> {
        self.append(&self.evidence, record.timestamp, record, &self.metrics.evidence_appended)
    }

    pub fn record_dependency_check(&self, check: &DependencyCheck) -> VigilResult<()> {
        self.append(&self.dependencies, check.timestamp, check, &self.metrics.evidence_appended)
    }

    /// Evidence rows written within `window`. Values are not decoded.
    pub fn count_recent_evidence(&self, window: Duration) -> VigilResult<u64> {
        let since = timestamp_prefix(cutoff(window));
        let mut count = 0u64;

        for entry in self.evidence.range(since..) {
            entry.map_err(|e| {
                self.metrics.record_error();
                VigilError::Storage(format!("Failed to iterate evidence: {}", e))
            })?;
            count += 1;
        }

        self.metrics.reads.fetch_add(count, Ordering::Relaxed);
        Ok(count)
    }

    /// Distinct dependencies checked within `window`, and how many of them
    /// succeeded on their most recent check.
    pub fn summarize_dependencies(&self, window: Duration) -> VigilResult<DependencyHealth> {
        let checks: Vec<DependencyCheck> = self.scan_since(&self.dependencies, cutoff(window))?;

        let mut latest: HashMap<String, bool> = HashMap::new();
        for check in checks {
            latest.insert(check.name, check.success);
        }

        Ok(DependencyHealth {
            healthy: latest.values().filter(|&&ok| ok).count() as u64,
            total: latest.len() as u64,
        })
    }

    pub fn count_recent_errors(&self, window: Duration) -> VigilResult<u64> {
        let events: Vec<EventRecord> = self.scan_since(&self.events, cutoff(window))?;
        Ok(events.iter().filter(|e| e.severity.is_error()).count() as u64)
    }

    pub fn recent_events(&self, limit: usize) -> VigilResult<Vec<EventRecord>> {
        self.latest(&self.events, limit)
    }

    pub fn recent_metrics(&self, kind: Option<MetricKind>, limit: usize) -> VigilResult<Vec<MetricRecord>> {
        match kind {
            None => self.latest(&self.metrics_tree, limit),
            Some(kind) => {
                let mut results: Vec<MetricRecord> = Vec::new();
                for entry in self.metrics_tree.iter().rev() {
                    if results.len() >= limit {
                        break;
                    }
                    let (_, value) = entry.map_err(|e| {
                        self.metrics.record_error();
                        VigilError::Storage(format!("Failed to iterate metrics: {}", e))
                    })?;
                    let metric: MetricRecord = self.decode(&value)?;
                    if metric.kind == kind {
                        results.push(metric);
                    }
                }
                results.reverse();
                Ok(results)
            }
        }
    }

    pub fn prune_older_than(&self, retention: Duration) -> VigilResult<PruneReport> {
        let before = timestamp_prefix(cutoff(retention));

        let report = PruneReport {
            events: self.prune_tree(&self.events, &before)?,
            metrics: self.prune_tree(&self.metrics_tree, &before)?,
            evidence: self.prune_tree(&self.evidence, &before)?,
            dependencies: self.prune_tree(&self.dependencies, &before)?,
        };

        if report.total() > 0 {
            info!(
                "Pruned {} records (events={}, metrics={}, evidence={}, dependencies={})",
                report.total(),
                report.events,
                report.metrics,
                report.evidence,
                report.dependencies
            );
        }

        Ok(report)
    }

    fn prune_tree(&self, tree: &Tree, before: &[u8; 8]) -> VigilResult<usize> {
        let mut count = 0;
        let mut batch = Batch::default();
        let mut batch_size = 0;

        let keys_to_remove: Vec<IVec> = tree
            .range(..&before[..])
            .filter_map(|r| r.ok())
            .map(|(k, _)| k)
            .collect();

        for key in keys_to_remove {
            batch.remove(key);
            batch_size += 1;
            count += 1;

            if batch_size >= MAX_BATCH_SIZE {
                self.apply_prune_batch(tree, batch, batch_size)?;
                batch = Batch::default();
                batch_size = 0;
            }
        }

        if batch_size > 0 {
            self.apply_prune_batch(tree, batch, batch_size)?;
        }

        if count > 0 {
            debug!("Pruned {} entries from tree {:?}", count, String::from_utf8_lossy(&tree.name()));
        }

        Ok(count)
    }

    fn apply_prune_batch(&self, tree: &Tree, batch: Batch, batch_size: usize) -> VigilResult<()> {
        tree.apply_batch(batch).map_err(|e| {
            self.metrics.record_error();
            VigilError::Storage(format!("Failed to prune records: {}", e))
        })?;
        self.metrics.pruned.fetch_add(batch_size as u64, Ordering::Relaxed);
        Ok(())
    }
}
