use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use super::types::LogLevel;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Filter directive used when neither `RUST_LOG` nor `-v` is given.
    pub fn filter_directive(&self) -> String {
        match self.level {
            LogLevel::Error | LogLevel::Warn | LogLevel::Info => self.level.to_string(),
            level => format!("info,vigil_daemon={}", level),
        }
    }
}
