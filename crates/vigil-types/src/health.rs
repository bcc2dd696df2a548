use crate::records::{MetricKind, MetricRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl HealthStatus {
    /// Both evidence sources must be positive for `Healthy`; either one
    /// alone keeps the status out of `Critical`.
    pub fn classify(recent_record_count: u64, healthy_dependency_count: u64) -> Self {
        let has_records = recent_record_count > 0;
        let has_dependencies = healthy_dependency_count > 0;

        if has_records && has_dependencies {
            Self::Healthy
        } else if has_records || has_dependencies {
            Self::Degraded
        } else {
            Self::Critical
        }
    }

    /// Encoding used for the `health_status` metric.
    pub fn metric_value(&self) -> f64 {
        match self {
            Self::Healthy => 1.0,
            Self::Degraded => 0.5,
            Self::Critical => 0.0,
        }
    }

    pub fn from_metric_value(value: f64) -> Option<Self> {
        if (value - 1.0).abs() < f64::EPSILON {
            Some(Self::Healthy)
        } else if (value - 0.5).abs() < f64::EPSILON {
            Some(Self::Degraded)
        } else if value.abs() < f64::EPSILON {
            Some(Self::Critical)
        } else {
            None
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Point-in-time health derived from persisted evidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub recent_record_count: u64,
    pub healthy_dependency_count: u64,
    pub total_dependency_count: u64,
    pub recent_error_count: u64,
    pub status: HealthStatus,
    /// Reads that failed or timed out and were counted as zero evidence.
    pub failed_reads: u32,
    pub captured_at: DateTime<Utc>,
}

impl HealthSnapshot {
    pub fn new(
        recent_record_count: u64,
        healthy_dependency_count: u64,
        total_dependency_count: u64,
        recent_error_count: u64,
    ) -> Self {
        Self {
            recent_record_count,
            healthy_dependency_count,
            total_dependency_count,
            recent_error_count,
            status: HealthStatus::classify(recent_record_count, healthy_dependency_count),
            failed_reads: 0,
            captured_at: Utc::now(),
        }
    }

    pub fn dependency_ratio(&self) -> f64 {
        if self.total_dependency_count == 0 {
            return 0.0;
        }
        self.healthy_dependency_count as f64 / self.total_dependency_count as f64
    }

    pub fn to_metric(&self) -> MetricRecord {
        MetricRecord::new(
            MetricKind::HealthStatus,
            self.status.metric_value(),
            format!(
                "{} (records={}, dependencies={}/{}, errors={}, failed_reads={})",
                self.status,
                self.recent_record_count,
                self.healthy_dependency_count,
                self.total_dependency_count,
                self.recent_error_count,
                self.failed_reads
            ),
        )
        .at(self.captured_at)
    }
}
