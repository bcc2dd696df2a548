use regex::RegexSet;
use vigil_types::{VigilError, VigilResult};

use super::types::LineSignal;
use crate::config::PatternConfig;

/// Decides what a line of worker output means.
pub trait LineClassifier: Send + Sync {
    fn classify(&self, line: &str) -> LineSignal;
}

/// Regex-driven classifier. Anomaly patterns win over startup, startup over
/// progress.
pub struct PatternClassifier {
    startup: RegexSet,
    progress: RegexSet,
    anomaly: RegexSet,
}

impl PatternClassifier {
    pub fn new(patterns: &PatternConfig) -> VigilResult<Self> {
        Ok(Self {
            startup: compile("startup", &patterns.startup)?,
            progress: compile("progress", &patterns.progress)?,
            anomaly: compile("anomaly", &patterns.anomaly)?,
        })
    }
}

fn compile(group: &str, patterns: &[String]) -> VigilResult<RegexSet> {
    RegexSet::new(patterns)
        .map_err(|e| VigilError::Config(format!("Invalid {} pattern: {}", group, e)))
}

impl LineClassifier for PatternClassifier {
    fn classify(&self, line: &str) -> LineSignal {
        if self.anomaly.is_match(line) {
            LineSignal::Anomaly
        } else if self.startup.is_match(line) {
            LineSignal::StartupComplete
        } else if self.progress.is_match(line) {
            LineSignal::Progress
        } else {
            LineSignal::Unrecognized
        }
    }
}
