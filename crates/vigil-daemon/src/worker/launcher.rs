use std::sync::Arc;
use vigil_types::VigilResult;

use super::classifier::{LineClassifier, PatternClassifier};
use super::handle::WorkerHandle;
use super::types::WorkerEventSender;
use crate::config::WorkerConfig;

/// Starts worker processes on behalf of the supervisor loop.
pub trait Launcher: Send + Sync {
    fn launch(&self, generation: u64, events: WorkerEventSender) -> VigilResult<WorkerHandle>;

    fn describe(&self) -> String;
}

/// Launches the configured command with the configured output patterns.
pub struct CommandLauncher {
    config: WorkerConfig,
    classifier: Arc<dyn LineClassifier>,
}

impl CommandLauncher {
    pub fn new(config: WorkerConfig) -> VigilResult<Self> {
        let classifier = Arc::new(PatternClassifier::new(&config.patterns)?);
        Ok(Self { config, classifier })
    }

    pub fn with_classifier(config: WorkerConfig, classifier: Arc<dyn LineClassifier>) -> Self {
        Self { config, classifier }
    }
}

impl Launcher for CommandLauncher {
    fn launch(&self, generation: u64, events: WorkerEventSender) -> VigilResult<WorkerHandle> {
        WorkerHandle::start(&self.config, self.classifier.clone(), generation, events)
    }

    fn describe(&self) -> String {
        self.config.command_line()
    }
}
