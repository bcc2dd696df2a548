use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Severities counted as errors by the health analyzer.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SupervisorStarted,
    SupervisorStopped,
    WorkerStarted,
    WorkerReady,
    WorkerAnomaly,
    WorkerExited,
    WorkerStopped,
    SpawnFailed,
    RestartTriggered,
    RestartBudgetExhausted,
    RestartBudgetReset,
    RetentionPruned,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SupervisorStarted => "supervisor_started",
            EventKind::SupervisorStopped => "supervisor_stopped",
            EventKind::WorkerStarted => "worker_started",
            EventKind::WorkerReady => "worker_ready",
            EventKind::WorkerAnomaly => "worker_anomaly",
            EventKind::WorkerExited => "worker_exited",
            EventKind::WorkerStopped => "worker_stopped",
            EventKind::SpawnFailed => "spawn_failed",
            EventKind::RestartTriggered => "restart_triggered",
            EventKind::RestartBudgetExhausted => "restart_budget_exhausted",
            EventKind::RestartBudgetReset => "restart_budget_reset",
            EventKind::RetentionPruned => "retention_pruned",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit entry. Never mutated once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub kind: EventKind,
    pub severity: Severity,
    pub description: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(kind: EventKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            description: description.into(),
            details: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn info(kind: EventKind, description: impl Into<String>) -> Self {
        Self::new(kind, Severity::Info, description)
    }

    pub fn warning(kind: EventKind, description: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, description)
    }

    pub fn error(kind: EventKind, description: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, description)
    }

    pub fn critical(kind: EventKind, description: impl Into<String>) -> Self {
        Self::new(kind, Severity::Critical, description)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    HealthStatus,
    CyclesExecuted,
    FailuresDetected,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::HealthStatus => "health_status",
            MetricKind::CyclesExecuted => "cycles_executed",
            MetricKind::FailuresDetected => "failures_detected",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub kind: MetricKind,
    pub value: f64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl MetricRecord {
    pub fn new(kind: MetricKind, value: f64, description: impl Into<String>) -> Self {
        Self {
            kind,
            value,
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
