use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub record_window_secs: u64,
    pub dependency_window_secs: u64,
    pub error_window_secs: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            record_window_secs: 600,
            dependency_window_secs: 300,
            error_window_secs: 300,
            read_timeout_ms: 2000,
            write_timeout_ms: 2000,
        }
    }
}

impl HealthConfig {
    pub fn record_window(&self) -> Duration {
        Duration::from_secs(self.record_window_secs)
    }

    pub fn dependency_window(&self) -> Duration {
        Duration::from_secs(self.dependency_window_secs)
    }

    pub fn error_window(&self) -> Duration {
        Duration::from_secs(self.error_window_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
