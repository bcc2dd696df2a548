use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use vigil_types::{EventRecord, MetricRecord, Severity, VigilError, VigilResult};

use crate::storage::{PruneReport, SupervisorStore};

const PRUNE_TIMEOUT: Duration = Duration::from_secs(60);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Append-only audit sink in front of the store.
///
/// Every event is mirrored to the tracing log. A write that fails or times
/// out is logged in full instead, so a broken store never takes the
/// supervisor down with it.
pub struct AuditTrail {
    store: Arc<dyn SupervisorStore>,
    write_timeout: Duration,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn SupervisorStore>, write_timeout: Duration) -> Self {
        Self {
            store,
            write_timeout,
        }
    }

    pub async fn event(&self, event: EventRecord) {
        mirror(&event);

        let result = tokio::time::timeout(self.write_timeout, self.store.append_event(&event)).await;
        if let Some(reason) = failure(result, self.write_timeout) {
            warn!(
                "Audit store unavailable ({}), event kept in local log: {}",
                reason,
                serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event))
            );
        }
    }

    pub async fn metric(&self, metric: MetricRecord) {
        let result = tokio::time::timeout(self.write_timeout, self.store.append_metric(&metric)).await;
        if let Some(reason) = failure(result, self.write_timeout) {
            warn!(
                "Audit store unavailable ({}), metric kept in local log: {} = {} ({})",
                reason, metric.kind, metric.value, metric.description
            );
        }
    }

    pub async fn prune(&self, retention: Duration) -> Option<PruneReport> {
        match tokio::time::timeout(PRUNE_TIMEOUT, self.store.prune_older_than(retention)).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                warn!("Retention pruning failed: {}", e);
                None
            }
            Err(_) => {
                warn!("Retention pruning timed out after {:?}", PRUNE_TIMEOUT);
                None
            }
        }
    }

    pub async fn flush(&self) -> VigilResult<()> {
        tokio::time::timeout(FLUSH_TIMEOUT, self.store.flush())
            .await
            .map_err(|_| VigilError::Timeout(format!("Store flush exceeded {:?}", FLUSH_TIMEOUT)))?
    }
}

fn failure(
    result: Result<VigilResult<()>, tokio::time::error::Elapsed>,
    timeout: Duration,
) -> Option<String> {
    match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("write timed out after {:?}", timeout)),
    }
}

fn mirror(event: &EventRecord) {
    match event.severity {
        Severity::Info => info!("[{}] {}", event.kind, event.description),
        Severity::Warning => warn!("[{}] {}", event.kind, event.description),
        Severity::Error | Severity::Critical => {
            error!("[{}] {} ({})", event.kind, event.description, event.severity)
        }
    }
}
