use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use vigil_types::{HealthSnapshot, VigilResult};

use crate::config::HealthConfig;
use crate::storage::SupervisorStore;

/// Turns persisted evidence into a [`HealthSnapshot`].
///
/// The three store reads run concurrently and each is bounded by
/// `read_timeout`. A read that fails or times out contributes zero evidence,
/// so a degraded store can only push the status toward critical.
pub struct HealthAnalyzer {
    store: Arc<dyn SupervisorStore>,
    config: HealthConfig,
}

impl HealthAnalyzer {
    pub fn new(store: Arc<dyn SupervisorStore>, config: HealthConfig) -> Self {
        Self { store, config }
    }

    pub async fn analyze(&self) -> HealthSnapshot {
        let timeout = self.config.read_timeout();

        let (records, dependencies, errors) = tokio::join!(
            bounded(
                "recent record count",
                timeout,
                self.store.recent_record_count(self.config.record_window()),
            ),
            bounded(
                "dependency health",
                timeout,
                self.store.dependency_health(self.config.dependency_window()),
            ),
            bounded(
                "recent error count",
                timeout,
                self.store.recent_error_count(self.config.error_window()),
            ),
        );

        let mut failed_reads = 0;
        let recent_record_count = records.unwrap_or_else(|| {
            failed_reads += 1;
            0
        });
        let dependencies = dependencies.unwrap_or_else(|| {
            failed_reads += 1;
            Default::default()
        });
        let recent_error_count = errors.unwrap_or_else(|| {
            failed_reads += 1;
            0
        });

        let mut snapshot = HealthSnapshot::new(
            recent_record_count,
            dependencies.healthy,
            dependencies.total,
            recent_error_count,
        );
        snapshot.failed_reads = failed_reads;

        debug!(
            "Health analysis: {} (records={}, dependencies={}/{}, errors={}, failed_reads={})",
            snapshot.status,
            snapshot.recent_record_count,
            snapshot.healthy_dependency_count,
            snapshot.total_dependency_count,
            snapshot.recent_error_count,
            snapshot.failed_reads
        );

        snapshot
    }
}

async fn bounded<T, F>(read: &str, timeout: Duration, future: F) -> Option<T>
where
    F: Future<Output = VigilResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!("Health read '{}' failed: {}", read, e);
            None
        }
        Err(_) => {
            warn!("Health read '{}' timed out after {:?}", read, timeout);
            None
        }
    }
}
