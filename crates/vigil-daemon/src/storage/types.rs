use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of evidence the worker reports about its own activity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub kind: String,
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl EvidenceRecord {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            details: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Outcome of one external dependency check performed by the worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DependencyCheck {
    pub name: String,
    pub success: bool,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl DependencyCheck {
    pub fn new(name: impl Into<String>, success: bool) -> Self {
        Self {
            name: name.into(),
            success,
            latency_ms: None,
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub healthy: u64,
    pub total: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub events: usize,
    pub metrics: usize,
    pub evidence: usize,
    pub dependencies: usize,
}

impl PruneReport {
    pub fn total(&self) -> usize {
        self.events + self.metrics + self.evidence + self.dependencies
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSizes {
    pub events: usize,
    pub metrics: usize,
    pub evidence: usize,
    pub dependencies: usize,
}
