use serde::{Deserialize, Serialize};
use std::time::Duration;
use super::constants::MAX_RESTART_COOLDOWN_SECS;
use super::types::BackoffMode;

/// Restart budget and timing, loaded once at supervisor start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    pub inactivity_timeout_secs: u64,
    pub monitoring_interval_secs: u64,
    pub max_restarts: u32,
    pub retention_days: u64,
    pub maintenance_interval_secs: u64,
    pub grace_period_secs: u64,
    pub restart_cooldown_secs: u64,
    pub backoff: BackoffMode,
    /// Restart on critical health only above this many recent errors.
    pub critical_error_threshold: u64,
    /// Preventive restart above this many anomalies since the last restart.
    pub failure_count_threshold: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 300,
            monitoring_interval_secs: 60,
            max_restarts: 5,
            retention_days: 7,
            maintenance_interval_secs: 3600,
            grace_period_secs: 10,
            restart_cooldown_secs: 5,
            backoff: BackoffMode::Fixed,
            critical_error_threshold: 5,
            failure_count_threshold: 10,
        }
    }
}

impl RestartPolicy {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring_interval_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    pub fn retention_window(&self) -> Duration {
        Duration::from_secs(self.retention_days * 86_400)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Cooldown before relaunching after `restarts_performed` prior restarts.
    pub fn cooldown(&self, restarts_performed: u32) -> Duration {
        let base = self.restart_cooldown_secs;
        let secs = match self.backoff {
            BackoffMode::Fixed => base,
            BackoffMode::Exponential => {
                let factor = 2u64.saturating_pow(restarts_performed);
                base.saturating_mul(factor).min(MAX_RESTART_COOLDOWN_SECS.max(base))
            }
        };
        Duration::from_secs(secs)
    }
}
