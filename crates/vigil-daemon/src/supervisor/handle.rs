use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use vigil_types::{VigilError, VigilResult};

use super::types::{StatusReport, SupervisorCommand};

/// Cheap, cloneable accessor for a running supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    status_rx: watch::Receiver<StatusReport>,
    commands: mpsc::Sender<SupervisorCommand>,
}

impl SupervisorHandle {
    pub(crate) fn new(
        status_rx: watch::Receiver<StatusReport>,
        commands: mpsc::Sender<SupervisorCommand>,
    ) -> Self {
        Self {
            status_rx,
            commands,
        }
    }

    /// Latest published status with uptime computed now.
    pub fn status(&self) -> StatusReport {
        let mut report = self.status_rx.borrow().clone();
        report.uptime_secs = (Utc::now() - report.started_at).num_seconds().max(0) as u64;
        report
    }

    /// Resolves once a published status satisfies `predicate`.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> VigilResult<StatusReport>
    where
        F: FnMut(&StatusReport) -> bool,
    {
        self.status_rx
            .wait_for(|report| predicate(report))
            .await
            .map(|report| report.clone())
            .map_err(|_| VigilError::Internal("Supervisor has shut down".into()))
    }

    pub async fn reset_restart_budget(&self) -> VigilResult<u32> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SupervisorCommand::ResetRestartBudget { reply })
            .await
            .map_err(|_| VigilError::Internal("Supervisor is not accepting commands".into()))?;
        rx.await
            .map_err(|_| VigilError::Internal("Supervisor dropped the reset request".into()))
    }
}
