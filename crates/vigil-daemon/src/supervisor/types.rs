use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;
use vigil_types::HealthSnapshot;

use crate::restart::RestartDecision;
use crate::worker::WorkerExit;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorPhase {
    Stopped,
    Starting,
    Running,
    Restarting,
    /// Budget exhausted with no live worker; only a budget reset leaves it.
    CircuitOpen,
}

impl SupervisorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::CircuitOpen => "circuit_open",
        }
    }
}

impl fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the supervisor for operators and tooling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub phase: SupervisorPhase,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub restarts_performed: u32,
    pub max_restarts: u32,
    pub worker_active: bool,
    pub worker_pid: Option<u32>,
    pub worker_generation: u64,
    pub cycles_executed: u64,
    pub failures_detected: u64,
    pub last_activity_at: DateTime<Utc>,
    pub monitor_ticks: u64,
    pub last_health: Option<HealthSnapshot>,
    pub last_decision: Option<RestartDecision>,
    pub last_exit: Option<WorkerExit>,
}

impl StatusReport {
    pub fn budget_remaining(&self) -> u32 {
        self.max_restarts.saturating_sub(self.restarts_performed)
    }
}

#[derive(Debug)]
pub enum SupervisorCommand {
    /// Clears `restarts_performed`; replies with the cleared count.
    ResetRestartBudget { reply: oneshot::Sender<u32> },
}
