use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_types::{HealthSnapshot, HealthStatus};

use crate::config::RestartPolicy;
use crate::supervisor::SupervisorState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartReason {
    BudgetExhausted,
    InactivityTimeout,
    WorkerExited,
    CriticalHealth,
    FailureCount,
    Nominal,
}

impl RestartReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BudgetExhausted => "restart budget exhausted",
            Self::InactivityTimeout => "inactivity timeout",
            Self::WorkerExited => "worker exited",
            Self::CriticalHealth => "critical health with elevated errors",
            Self::FailureCount => "preventive restart: failure count",
            Self::Nominal => "nominal",
        }
    }
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartDecision {
    pub restart: bool,
    pub reason: RestartReason,
}

impl RestartDecision {
    fn restart(reason: RestartReason) -> Self {
        Self { restart: true, reason }
    }

    fn hold(reason: RestartReason) -> Self {
        Self { restart: false, reason }
    }
}

/// Decides whether the worker should be restarted. First matching rule wins:
/// an exhausted budget beats every trigger, and inactivity beats the
/// health-based triggers.
pub fn should_restart(
    state: &SupervisorState,
    health: &HealthSnapshot,
    now: DateTime<Utc>,
    policy: &RestartPolicy,
) -> RestartDecision {
    if state.restarts_performed() >= policy.max_restarts {
        return RestartDecision::hold(RestartReason::BudgetExhausted);
    }

    if state.idle_for(now) > policy.inactivity_timeout() {
        return RestartDecision::restart(RestartReason::InactivityTimeout);
    }

    if state.worker_exit().is_some() {
        return RestartDecision::restart(RestartReason::WorkerExited);
    }

    if health.status == HealthStatus::Critical
        && health.recent_error_count > policy.critical_error_threshold
    {
        return RestartDecision::restart(RestartReason::CriticalHealth);
    }

    if state.failures_detected() > policy.failure_count_threshold {
        return RestartDecision::restart(RestartReason::FailureCount);
    }

    RestartDecision::hold(RestartReason::Nominal)
}
