use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::worker::{LineSignal, WorkerExit};

/// Counters and timestamps the supervisor loop owns exclusively.
///
/// `restarts_performed` only grows, except through an explicit budget reset
/// requested by an operator.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SupervisorState {
    last_activity_at: DateTime<Utc>,
    cycles_executed: u64,
    failures_detected: u64,
    restarts_performed: u32,
    up_time_origin: DateTime<Utc>,
    worker_exit: Option<WorkerExit>,
}

impl SupervisorState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_activity_at: now,
            cycles_executed: 0,
            failures_detected: 0,
            restarts_performed: 0,
            up_time_origin: now,
            worker_exit: None,
        }
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    pub fn cycles_executed(&self) -> u64 {
        self.cycles_executed
    }

    pub fn failures_detected(&self) -> u64 {
        self.failures_detected
    }

    pub fn restarts_performed(&self) -> u32 {
        self.restarts_performed
    }

    pub fn up_time_origin(&self) -> DateTime<Utc> {
        self.up_time_origin
    }

    /// Exit of the current worker that has not yet been acted upon.
    pub fn worker_exit(&self) -> Option<&WorkerExit> {
        self.worker_exit.as_ref()
    }

    pub fn uptime(&self, now: DateTime<Utc>) -> Duration {
        (now - self.up_time_origin).to_std().unwrap_or(Duration::ZERO)
    }

    /// Time since the last recognized signal; zero if the clock went backwards.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn record_signal(&mut self, signal: LineSignal, at: DateTime<Utc>) {
        match signal {
            LineSignal::StartupComplete => self.record_activity(at),
            LineSignal::Progress => self.record_cycle(at),
            LineSignal::Anomaly => self.record_failure(at),
            LineSignal::Unrecognized => {}
        }
    }

    pub fn record_activity(&mut self, at: DateTime<Utc>) {
        if at > self.last_activity_at {
            self.last_activity_at = at;
        }
    }

    pub fn record_cycle(&mut self, at: DateTime<Utc>) {
        self.cycles_executed = self.cycles_executed.saturating_add(1);
        self.record_activity(at);
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>) {
        self.failures_detected = self.failures_detected.saturating_add(1);
        self.record_activity(at);
    }

    /// A fresh worker counts as activity so it is not judged idle at once.
    pub fn on_worker_started(&mut self, at: DateTime<Utc>) {
        self.worker_exit = None;
        self.record_activity(at);
    }

    pub fn on_worker_exit(&mut self, exit: WorkerExit) {
        self.worker_exit = Some(exit);
    }

    pub fn on_restart(&mut self, at: DateTime<Utc>) {
        self.restarts_performed = self.restarts_performed.saturating_add(1);
        self.failures_detected = 0;
        self.worker_exit = None;
        self.last_activity_at = at;
    }

    /// Returns the count that was cleared.
    pub fn reset_restart_budget(&mut self) -> u32 {
        std::mem::take(&mut self.restarts_performed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_signals_update_counters() {
        let start = Utc::now();
        let mut state = SupervisorState::new(start);

        let later = start + ChronoDuration::seconds(5);
        state.record_signal(LineSignal::Progress, later);
        state.record_signal(LineSignal::Progress, later);
        state.record_signal(LineSignal::Anomaly, later);
        state.record_signal(LineSignal::Unrecognized, later + ChronoDuration::seconds(5));

        assert_eq!(state.cycles_executed(), 2);
        assert_eq!(state.failures_detected(), 1);
        assert_eq!(state.last_activity_at(), later);
    }

    #[test]
    fn test_activity_never_moves_backwards() {
        let start = Utc::now();
        let mut state = SupervisorState::new(start);
        state.record_activity(start - ChronoDuration::seconds(30));
        assert_eq!(state.last_activity_at(), start);
    }

    #[test]
    fn test_restart_resets_failures_but_not_restarts() {
        let start = Utc::now();
        let mut state = SupervisorState::new(start);
        for _ in 0..4 {
            state.record_failure(start);
        }
        state.on_worker_exit(WorkerExit::unknown());

        let restart_at = start + ChronoDuration::seconds(60);
        state.on_restart(restart_at);
        state.on_restart(restart_at);

        assert_eq!(state.failures_detected(), 0);
        assert_eq!(state.restarts_performed(), 2);
        assert_eq!(state.last_activity_at(), restart_at);
        assert!(state.worker_exit().is_none());
        assert_eq!(state.up_time_origin(), start);
    }

    #[test]
    fn test_reset_restart_budget() {
        let mut state = SupervisorState::new(Utc::now());
        state.on_restart(Utc::now());
        state.on_restart(Utc::now());
        assert_eq!(state.reset_restart_budget(), 2);
        assert_eq!(state.restarts_performed(), 0);
    }

    #[test]
    fn test_idle_and_uptime() {
        let start = Utc::now();
        let state = SupervisorState::new(start);
        let now = start + ChronoDuration::seconds(90);
        assert_eq!(state.idle_for(now), Duration::from_secs(90));
        assert_eq!(state.uptime(now), Duration::from_secs(90));
        assert_eq!(state.idle_for(start - ChronoDuration::seconds(1)), Duration::ZERO);
    }
}
