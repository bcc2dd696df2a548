use async_trait::async_trait;
use std::time::Duration;
use vigil_types::{EventRecord, MetricRecord, VigilError, VigilResult};

use super::{DependencyHealth, PruneReport, SupervisorStorage};

/// What the supervisor needs from its audit and evidence store.
///
/// Callers bound every call with their own timeout, so implementations must
/// not block the calling task.
#[async_trait]
pub trait SupervisorStore: Send + Sync {
    async fn append_event(&self, event: &EventRecord) -> VigilResult<()>;

    async fn append_metric(&self, metric: &MetricRecord) -> VigilResult<()>;

    /// Rows produced by the worker within `window`.
    async fn recent_record_count(&self, window: Duration) -> VigilResult<u64>;

    async fn dependency_health(&self, window: Duration) -> VigilResult<DependencyHealth>;

    /// Error and critical events within `window`.
    async fn recent_error_count(&self, window: Duration) -> VigilResult<u64>;

    /// The only operation allowed to delete records.
    async fn prune_older_than(&self, retention: Duration) -> VigilResult<PruneReport>;

    async fn flush(&self) -> VigilResult<()>;
}

/// sled calls block, so each one runs on the blocking pool. That keeps the
/// runtime free and lets the callers' timeouts fire on slow scans.
async fn off_runtime<T, F>(storage: &SupervisorStorage, op: F) -> VigilResult<T>
where
    T: Send + 'static,
    F: FnOnce(&SupervisorStorage) -> VigilResult<T> + Send + 'static,
{
    let storage = storage.clone();
    tokio::task::spawn_blocking(move || op(&storage))
        .await
        .map_err(|e| VigilError::Internal(format!("Store task failed: {}", e)))?
}

#[async_trait]
impl SupervisorStore for SupervisorStorage {
    async fn append_event(&self, event: &EventRecord) -> VigilResult<()> {
        let event = event.clone();
        off_runtime(self, move |storage| storage.append_event(&event)).await
    }

    async fn append_metric(&self, metric: &MetricRecord) -> VigilResult<()> {
        let metric = metric.clone();
        off_runtime(self, move |storage| storage.append_metric(&metric)).await
    }

    async fn recent_record_count(&self, window: Duration) -> VigilResult<u64> {
        off_runtime(self, move |storage| storage.count_recent_evidence(window)).await
    }

    async fn dependency_health(&self, window: Duration) -> VigilResult<DependencyHealth> {
        off_runtime(self, move |storage| storage.summarize_dependencies(window)).await
    }

    async fn recent_error_count(&self, window: Duration) -> VigilResult<u64> {
        off_runtime(self, move |storage| storage.count_recent_errors(window)).await
    }

    async fn prune_older_than(&self, retention: Duration) -> VigilResult<PruneReport> {
        off_runtime(self, move |storage| storage.prune_older_than(retention)).await
    }

    async fn flush(&self) -> VigilResult<()> {
        self.flush_async().await
    }
}
