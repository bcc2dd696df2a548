use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Layered over the inherited environment.
    pub env: BTreeMap<String, String>,
    pub patterns: PatternConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            patterns: PatternConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Regular expressions used to classify worker output lines.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub startup: Vec<String>,
    pub progress: Vec<String>,
    pub anomaly: Vec<String>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            startup: vec![
                r"(?i)\bstarted\b".to_string(),
                r"(?i)\bready\b".to_string(),
            ],
            progress: vec![
                r"(?i)\bcycle\b.*\b(complete|completed|finished)\b".to_string(),
                r"(?i)\bprocessed\b".to_string(),
            ],
            anomaly: vec![
                r"(?i)\bwarn(ing)?\b".to_string(),
                r"(?i)\berror\b".to_string(),
                r"(?i)\bexception\b".to_string(),
            ],
        }
    }
}
