use super::*;
use chrono::Utc;
use std::time::Duration;
use vigil_types::{EventKind, EventRecord, MetricKind, MetricRecord};

fn minutes_ago(minutes: i64) -> chrono::DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(minutes)
}

#[test]
fn test_open_memory_initializes_schema() {
    let storage = SupervisorStorage::open_memory().unwrap();
    assert_eq!(storage.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    assert!(storage.is_in_memory());
}

#[test]
fn test_newer_schema_is_rejected() {
    let storage = SupervisorStorage::open_memory().unwrap();
    storage
        .write_schema(&SchemaInfo {
            version: CURRENT_SCHEMA_VERSION + 1,
            created_at: 0,
        })
        .unwrap();
    assert!(storage.ensure_schema().is_err());
}

#[test]
fn test_events_are_returned_in_append_order() {
    let storage = SupervisorStorage::open_memory().unwrap();
    let now = Utc::now();

    for kind in [EventKind::WorkerStarted, EventKind::WorkerReady, EventKind::RestartTriggered] {
        storage.append_event(&EventRecord::info(kind, "test").at(now)).unwrap();
    }

    let events = storage.recent_events(10).unwrap();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::WorkerStarted, EventKind::WorkerReady, EventKind::RestartTriggered]
    );

    let last_two = storage.recent_events(2).unwrap();
    assert_eq!(last_two.len(), 2);
    assert_eq!(last_two[1].kind, EventKind::RestartTriggered);
}

#[test]
fn test_recent_evidence_respects_window() {
    let storage = SupervisorStorage::open_memory().unwrap();

    storage.record_evidence(&EvidenceRecord::new("trade").at(minutes_ago(30))).unwrap();
    storage.record_evidence(&EvidenceRecord::new("trade").at(minutes_ago(4))).unwrap();
    storage.record_evidence(&EvidenceRecord::new("signal")).unwrap();

    assert_eq!(storage.count_recent_evidence(Duration::from_secs(600)).unwrap(), 2);
    assert_eq!(storage.count_recent_evidence(Duration::from_secs(3600)).unwrap(), 3);
}

#[test]
fn test_dependency_health_uses_latest_check_per_name() {
    let storage = SupervisorStorage::open_memory().unwrap();

    storage.record_dependency_check(&DependencyCheck::new("exchange", false).at(minutes_ago(3))).unwrap();
    storage.record_dependency_check(&DependencyCheck::new("exchange", true).at(minutes_ago(1))).unwrap();
    storage.record_dependency_check(&DependencyCheck::new("prices", true).at(minutes_ago(2))).unwrap();
    storage.record_dependency_check(&DependencyCheck::new("prices", false)).unwrap();
    storage.record_dependency_check(&DependencyCheck::new("stale", true).at(minutes_ago(20))).unwrap();

    let health = storage.summarize_dependencies(Duration::from_secs(300)).unwrap();
    assert_eq!(health, DependencyHealth { healthy: 1, total: 2 });
}

#[test]
fn test_error_count_only_counts_error_severities() {
    let storage = SupervisorStorage::open_memory().unwrap();

    storage.append_event(&EventRecord::info(EventKind::WorkerStarted, "ok")).unwrap();
    storage.append_event(&EventRecord::warning(EventKind::WorkerAnomaly, "warn")).unwrap();
    storage.append_event(&EventRecord::error(EventKind::WorkerExited, "crash")).unwrap();
    storage.append_event(&EventRecord::critical(EventKind::SpawnFailed, "gone")).unwrap();
    storage
        .append_event(&EventRecord::error(EventKind::WorkerExited, "old").at(minutes_ago(10)))
        .unwrap();

    assert_eq!(storage.count_recent_errors(Duration::from_secs(300)).unwrap(), 2);
}

#[test]
fn test_recent_metrics_filter_by_kind() {
    let storage = SupervisorStorage::open_memory().unwrap();

    storage.append_metric(&MetricRecord::new(MetricKind::HealthStatus, 1.0, "healthy")).unwrap();
    storage.append_metric(&MetricRecord::new(MetricKind::CyclesExecuted, 42.0, "cycles")).unwrap();
    storage.append_metric(&MetricRecord::new(MetricKind::HealthStatus, 0.0, "critical")).unwrap();

    let health = storage.recent_metrics(Some(MetricKind::HealthStatus), 10).unwrap();
    assert_eq!(health.len(), 2);
    assert_eq!(health[0].value, 1.0);
    assert_eq!(health[1].value, 0.0);

    assert_eq!(storage.recent_metrics(None, 10).unwrap().len(), 3);
}

#[test]
fn test_prune_removes_only_expired_records() {
    let storage = SupervisorStorage::open_memory().unwrap();
    let old = Utc::now() - chrono::Duration::days(10);

    storage.append_event(&EventRecord::info(EventKind::WorkerStarted, "old").at(old)).unwrap();
    storage.append_event(&EventRecord::info(EventKind::WorkerStarted, "new")).unwrap();
    storage.append_metric(&MetricRecord::new(MetricKind::HealthStatus, 1.0, "old").at(old)).unwrap();
    storage.record_evidence(&EvidenceRecord::new("trade").at(old)).unwrap();
    storage.record_dependency_check(&DependencyCheck::new("exchange", true).at(old)).unwrap();
    storage.record_dependency_check(&DependencyCheck::new("exchange", true)).unwrap();

    let report = storage.prune_older_than(Duration::from_secs(7 * 86_400)).unwrap();
    assert_eq!(
        report,
        PruneReport {
            events: 1,
            metrics: 1,
            evidence: 1,
            dependencies: 1,
        }
    );

    let sizes = storage.tree_sizes();
    assert_eq!(sizes.events, 1);
    assert_eq!(sizes.metrics, 0);
    assert_eq!(sizes.evidence, 0);
    assert_eq!(sizes.dependencies, 1);
    assert_eq!(storage.storage_metrics().snapshot().pruned, 4);
}

#[test]
fn test_prune_handles_more_than_one_batch() {
    let storage = SupervisorStorage::open_memory().unwrap();
    let old = Utc::now() - chrono::Duration::days(30);

    for _ in 0..(MAX_BATCH_SIZE + 5) {
        storage.record_evidence(&EvidenceRecord::new("trade").at(old)).unwrap();
    }

    let report = storage.prune_older_than(Duration::from_secs(86_400)).unwrap();
    assert_eq!(report.evidence, MAX_BATCH_SIZE + 5);
    assert_eq!(storage.tree_sizes().evidence, 0);
}

#[tokio::test]
async fn test_store_trait_round_trip() {
    let storage: std::sync::Arc<dyn SupervisorStore> =
        std::sync::Arc::new(SupervisorStorage::open_memory().unwrap());

    storage
        .append_event(&EventRecord::error(EventKind::WorkerExited, "exit 1"))
        .await
        .unwrap();
    storage
        .append_metric(&MetricRecord::new(MetricKind::HealthStatus, 0.5, "degraded"))
        .await
        .unwrap();

    assert_eq!(storage.recent_error_count(Duration::from_secs(60)).await.unwrap(), 1);
    assert_eq!(storage.recent_record_count(Duration::from_secs(60)).await.unwrap(), 0);
    assert_eq!(
        storage.dependency_health(Duration::from_secs(60)).await.unwrap(),
        DependencyHealth::default()
    );
    storage.flush().await.unwrap();
}

#[test]
fn test_append_counters() {
    let storage = SupervisorStorage::open_memory().unwrap();
    storage.append_event(&EventRecord::info(EventKind::WorkerStarted, "a")).unwrap();
    storage.record_evidence(&EvidenceRecord::new("trade")).unwrap();
    storage.record_dependency_check(&DependencyCheck::new("db", true)).unwrap();

    let snapshot = storage.storage_metrics().snapshot();
    assert_eq!(snapshot.events_appended, 1);
    assert_eq!(snapshot.evidence_appended, 2);
    assert_eq!(snapshot.errors, 0);
}
