use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};
use vigil_types::{
    EventKind, EventRecord, HealthSnapshot, MetricKind, MetricRecord, Severity, VigilResult,
};

use super::audit::AuditTrail;
use super::cancellation::CancellationToken;
use super::handle::SupervisorHandle;
use super::state::SupervisorState;
use super::ticker::Ticker;
use super::types::*;
use crate::config::{HealthConfig, RestartPolicy};
use crate::health::HealthAnalyzer;
use crate::restart::{should_restart, RestartDecision, RestartReason};
use crate::storage::SupervisorStore;
use crate::worker::{
    Launcher, LineSignal, StopOutcome, WorkerEvent, WorkerEventKind, WorkerEventReceiver,
    WorkerEventSender, WorkerHandle,
};

const COMMAND_QUEUE_DEPTH: usize = 16;

/// Keeps one worker alive under a bounded restart budget.
///
/// The supervisor is the only writer of [`SupervisorState`]. Output readers
/// and the process reaper report through a channel, commands arrive through
/// [`SupervisorHandle`], and every transition happens inside [`run`].
///
/// [`run`]: Supervisor::run
pub struct Supervisor {
    launcher: Arc<dyn Launcher>,
    analyzer: HealthAnalyzer,
    audit: AuditTrail,
    policy: RestartPolicy,
    state: SupervisorState,
    phase: SupervisorPhase,
    worker: Option<WorkerHandle>,
    generation: u64,
    events_tx: WorkerEventSender,
    events_rx: WorkerEventReceiver,
    commands_rx: mpsc::Receiver<SupervisorCommand>,
    status_tx: watch::Sender<StatusReport>,
    shutdown: CancellationToken,
    last_health: Option<HealthSnapshot>,
    last_decision: Option<RestartDecision>,
    last_exit: Option<crate::worker::WorkerExit>,
    circuit_reported: bool,
    monitor_ticks: u64,
}

impl Supervisor {
    pub fn new(
        launcher: Arc<dyn Launcher>,
        store: Arc<dyn SupervisorStore>,
        policy: RestartPolicy,
        health: HealthConfig,
    ) -> (Self, SupervisorHandle) {
        let state = SupervisorState::new(Utc::now());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let initial = StatusReport {
            phase: SupervisorPhase::Stopped,
            started_at: state.up_time_origin(),
            uptime_secs: 0,
            restarts_performed: 0,
            max_restarts: policy.max_restarts,
            worker_active: false,
            worker_pid: None,
            worker_generation: 0,
            cycles_executed: 0,
            failures_detected: 0,
            last_activity_at: state.last_activity_at(),
            monitor_ticks: 0,
            last_health: None,
            last_decision: None,
            last_exit: None,
        };
        let (status_tx, status_rx) = watch::channel(initial);

        let supervisor = Self {
            launcher,
            analyzer: HealthAnalyzer::new(store.clone(), health.clone()),
            audit: AuditTrail::new(store, health.write_timeout()),
            policy,
            state,
            phase: SupervisorPhase::Stopped,
            worker: None,
            generation: 0,
            events_tx,
            events_rx,
            commands_rx,
            status_tx,
            shutdown: CancellationToken::new(),
            last_health: None,
            last_decision: None,
            last_exit: None,
            circuit_reported: false,
            monitor_ticks: 0,
        };

        (supervisor, SupervisorHandle::new(status_rx, commands_tx))
    }

    /// Runs until `shutdown` is cancelled and returns the final state.
    ///
    /// Only a spawn failure of the very first worker is returned as an
    /// error; everything after that is handled inside the loop.
    pub async fn run<M, T>(
        mut self,
        mut monitor: M,
        mut maintenance: T,
        shutdown: CancellationToken,
    ) -> VigilResult<SupervisorState>
    where
        M: Ticker,
        T: Ticker,
    {
        self.shutdown = shutdown.clone();
        let mut shutdown = shutdown;

        self.audit
            .event(
                EventRecord::info(
                    EventKind::SupervisorStarted,
                    format!("Supervising '{}'", self.launcher.describe()),
                )
                .with_details(json!({
                    "max_restarts": self.policy.max_restarts,
                    "inactivity_timeout_secs": self.policy.inactivity_timeout_secs,
                    "monitoring_interval_secs": self.policy.monitoring_interval_secs,
                    "grace_period_secs": self.policy.grace_period_secs,
                })),
            )
            .await;

        if let Err(e) = self.start_worker().await {
            self.finish("initial spawn failed").await;
            return Err(e);
        }
        self.publish_status();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(event) = self.events_rx.recv() => self.handle_worker_event(event).await,
                Some(command) = self.commands_rx.recv() => self.handle_command(command).await,
                _ = monitor.tick() => self.on_monitor_tick().await,
                _ = maintenance.tick() => self.on_maintenance_tick().await,
            }
        }

        self.finish("shutdown requested").await;
        Ok(self.state)
    }

    async fn start_worker(&mut self) -> VigilResult<()> {
        self.set_phase(SupervisorPhase::Starting);
        self.generation += 1;
        let generation = self.generation;

        match self.launcher.launch(generation, self.events_tx.clone()) {
            Ok(handle) => {
                let pid = handle.pid();
                self.worker = Some(handle);
                self.state.on_worker_started(Utc::now());
                self.set_phase(SupervisorPhase::Running);

                self.audit
                    .event(
                        EventRecord::info(
                            EventKind::WorkerStarted,
                            format!("Worker generation {} started (pid {:?})", generation, pid),
                        )
                        .with_details(json!({
                            "generation": generation,
                            "pid": pid,
                            "command": self.launcher.describe(),
                            "restarts_performed": self.state.restarts_performed(),
                        })),
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                self.set_phase(SupervisorPhase::Stopped);
                self.audit
                    .event(
                        EventRecord::critical(
                            EventKind::SpawnFailed,
                            format!("Failed to start worker: {}", e),
                        )
                        .with_details(json!({
                            "generation": generation,
                            "command": self.launcher.describe(),
                            "error": e.to_string(),
                        })),
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn stop_worker(&mut self, context: &str) -> Option<StopOutcome> {
        let worker = self.worker.take()?;
        let generation = worker.generation();
        let pid = worker.pid();

        let outcome = worker.stop(self.policy.grace_period()).await;
        let exit = outcome.exit().clone();
        let severity = if outcome.is_forced() {
            Severity::Warning
        } else {
            Severity::Info
        };

        self.audit
            .event(
                EventRecord::new(
                    EventKind::WorkerStopped,
                    severity,
                    format!(
                        "Worker generation {} stopped for {} ({}, {})",
                        generation,
                        context,
                        outcome.as_str(),
                        exit
                    ),
                )
                .with_details(json!({
                    "generation": generation,
                    "pid": pid,
                    "outcome": outcome.as_str(),
                    "exit_code": exit.code,
                    "signal": exit.signal,
                    "context": context,
                })),
            )
            .await;

        self.last_exit = Some(exit);
        Some(outcome)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.worker.as_ref().map(WorkerHandle::generation) == Some(generation)
    }

    async fn handle_worker_event(&mut self, event: WorkerEvent) {
        let generation = event.generation;
        let current = self.is_current(generation);

        match event.kind {
            WorkerEventKind::Output {
                stream,
                signal,
                line,
            } => {
                if !current {
                    trace!("Dropping output of replaced worker generation {}", generation);
                    return;
                }

                self.state.record_signal(signal, Utc::now());

                match signal {
                    LineSignal::StartupComplete => {
                        self.audit
                            .event(
                                EventRecord::info(
                                    EventKind::WorkerReady,
                                    format!("Worker generation {} reported ready", generation),
                                )
                                .with_details(json!({ "stream": stream, "line": line })),
                            )
                            .await;
                    }
                    LineSignal::Anomaly => {
                        self.audit
                            .event(
                                EventRecord::warning(EventKind::WorkerAnomaly, line).with_details(
                                    json!({
                                        "generation": generation,
                                        "stream": stream,
                                        "failures_detected": self.state.failures_detected(),
                                    }),
                                ),
                            )
                            .await;
                    }
                    LineSignal::Progress => {
                        trace!("Worker progress: {}", line);
                    }
                    LineSignal::Unrecognized => {}
                }

                self.publish_status();
            }
            WorkerEventKind::Exited(exit) => {
                if !current {
                    debug!(
                        "Worker generation {} exited after being replaced ({})",
                        generation, exit
                    );
                    return;
                }

                self.worker = None;
                self.audit
                    .event(
                        EventRecord::new(
                            EventKind::WorkerExited,
                            exit.severity(),
                            format!("Worker generation {} exited ({})", generation, exit),
                        )
                        .with_details(json!({
                            "generation": generation,
                            "exit_code": exit.code,
                            "signal": exit.signal,
                            "restarts_performed": self.state.restarts_performed(),
                        })),
                    )
                    .await;

                self.last_exit = Some(exit.clone());
                self.state.on_worker_exit(exit);
                self.evaluate().await;
                self.publish_status();
            }
        }
    }

    async fn handle_command(&mut self, command: SupervisorCommand) {
        match command {
            SupervisorCommand::ResetRestartBudget { reply } => {
                let cleared = self.state.reset_restart_budget();
                self.circuit_reported = false;

                self.audit
                    .event(
                        EventRecord::info(
                            EventKind::RestartBudgetReset,
                            format!("Restart budget reset ({} restarts cleared)", cleared),
                        )
                        .with_details(json!({
                            "cleared": cleared,
                            "max_restarts": self.policy.max_restarts,
                            "phase": self.phase,
                        })),
                    )
                    .await;

                if self.worker.is_none() {
                    if let Err(e) = self.start_worker().await {
                        warn!("Relaunch after budget reset failed: {}", e);
                    }
                }

                let _ = reply.send(cleared);
                self.publish_status();
            }
        }
    }

    async fn on_monitor_tick(&mut self) {
        self.monitor_ticks += 1;

        match self.phase {
            SupervisorPhase::Running => self.evaluate().await,
            phase => debug!("Monitoring tick skipped while {}", phase),
        }

        self.publish_status();
    }

    async fn on_maintenance_tick(&mut self) {
        let retention = self.policy.retention_window();
        let Some(report) = self.audit.prune(retention).await else {
            return;
        };

        if report.total() == 0 {
            debug!("Retention pass found nothing older than {} days", self.policy.retention_days);
            return;
        }

        self.audit
            .event(
                EventRecord::info(
                    EventKind::RetentionPruned,
                    format!(
                        "Pruned {} records older than {} days",
                        report.total(),
                        self.policy.retention_days
                    ),
                )
                .with_details(serde_json::to_value(report).unwrap_or_default()),
            )
            .await;
    }

    /// Health analysis, then the decision, then the action. The health
    /// metric is always written before anything derived from it.
    async fn evaluate(&mut self) {
        let snapshot = self.analyzer.analyze().await;
        self.audit.metric(snapshot.to_metric()).await;

        let decision = should_restart(&self.state, &snapshot, Utc::now(), &self.policy);
        self.last_decision = Some(decision);

        if decision.restart {
            self.restart(decision, &snapshot).await;
        } else if decision.reason == RestartReason::BudgetExhausted {
            self.on_budget_exhausted(&snapshot).await;
        } else {
            self.log_status_summary(&snapshot);
            self.audit
                .metric(MetricRecord::new(
                    MetricKind::CyclesExecuted,
                    self.state.cycles_executed() as f64,
                    "units of work completed",
                ))
                .await;
            self.audit
                .metric(MetricRecord::new(
                    MetricKind::FailuresDetected,
                    self.state.failures_detected() as f64,
                    "anomalies since last restart",
                ))
                .await;
        }

        self.last_health = Some(snapshot);
    }

    async fn restart(&mut self, decision: RestartDecision, snapshot: &HealthSnapshot) {
        let previous = self.state.restarts_performed();
        self.set_phase(SupervisorPhase::Restarting);

        self.audit
            .event(
                EventRecord::warning(
                    EventKind::RestartTriggered,
                    format!("Restarting worker: {}", decision.reason),
                )
                .with_details(json!({
                    "reason": decision.reason,
                    "reason_text": decision.reason.as_str(),
                    "restarts_performed": previous,
                    "max_restarts": self.policy.max_restarts,
                    "health_status": snapshot.status,
                    "recent_error_count": snapshot.recent_error_count,
                    "failures_detected": self.state.failures_detected(),
                    "idle_secs": self.state.idle_for(Utc::now()).as_secs(),
                    "last_exit": self.state.worker_exit(),
                })),
            )
            .await;

        self.stop_worker("restart").await;

        let cooldown = self.policy.cooldown(previous);
        if !cooldown.is_zero() {
            debug!("Cooling down for {:?} before relaunch", cooldown);
            let mut shutdown = self.shutdown.clone();
            tokio::select! {
                _ = tokio::time::sleep(cooldown) => {}
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested during restart cooldown, not relaunching");
                    self.set_phase(SupervisorPhase::Stopped);
                    return;
                }
            }
        }

        self.state.on_restart(Utc::now());
        info!(
            "Restart {}/{} ({})",
            self.state.restarts_performed(),
            self.policy.max_restarts,
            decision.reason
        );

        if let Err(e) = self.start_worker().await {
            warn!("Worker relaunch failed, supervision halted until reset: {}", e);
        }
    }

    async fn on_budget_exhausted(&mut self, snapshot: &HealthSnapshot) {
        if self.worker.is_none() {
            self.set_phase(SupervisorPhase::CircuitOpen);
        }

        if self.circuit_reported {
            return;
        }
        self.circuit_reported = true;

        self.audit
            .event(
                EventRecord::critical(
                    EventKind::RestartBudgetExhausted,
                    format!(
                        "Restart budget exhausted ({} of {}), automatic restarts suspended until reset",
                        self.state.restarts_performed(),
                        self.policy.max_restarts
                    ),
                )
                .with_details(json!({
                    "restarts_performed": self.state.restarts_performed(),
                    "max_restarts": self.policy.max_restarts,
                    "health_status": snapshot.status,
                    "worker_active": self.worker.is_some(),
                    "last_exit": self.state.worker_exit(),
                })),
            )
            .await;
    }

    async fn finish(&mut self, reason: &str) {
        info!("Supervisor stopping: {}", reason);
        let outcome = self.stop_worker("shutdown").await;
        self.set_phase(SupervisorPhase::Stopped);

        let uptime = self.state.uptime(Utc::now());
        self.audit
            .event(
                EventRecord::info(
                    EventKind::SupervisorStopped,
                    format!("Supervisor stopped after {}s ({})", uptime.as_secs(), reason),
                )
                .with_details(json!({
                    "uptime_secs": uptime.as_secs(),
                    "restarts_performed": self.state.restarts_performed(),
                    "cycles_executed": self.state.cycles_executed(),
                    "worker_stop": outcome.as_ref().map(StopOutcome::as_str),
                })),
            )
            .await;

        if let Err(e) = self.audit.flush().await {
            warn!("Failed to flush store on shutdown: {}", e);
        }

        self.publish_status();
    }

    fn set_phase(&mut self, phase: SupervisorPhase) {
        if self.phase != phase {
            debug!("Supervisor phase {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    fn log_status_summary(&self, snapshot: &HealthSnapshot) {
        info!(
            "Status: phase={} health={} records={} dependencies={}/{} errors={} cycles={} failures={} restarts={}/{} idle={}s",
            self.phase,
            snapshot.status,
            snapshot.recent_record_count,
            snapshot.healthy_dependency_count,
            snapshot.total_dependency_count,
            snapshot.recent_error_count,
            self.state.cycles_executed(),
            self.state.failures_detected(),
            self.state.restarts_performed(),
            self.policy.max_restarts,
            self.state.idle_for(Utc::now()).as_secs()
        );
    }

    fn publish_status(&self) {
        let report = StatusReport {
            phase: self.phase,
            started_at: self.state.up_time_origin(),
            uptime_secs: self.state.uptime(Utc::now()).as_secs(),
            restarts_performed: self.state.restarts_performed(),
            max_restarts: self.policy.max_restarts,
            worker_active: self.worker.is_some(),
            worker_pid: self.worker.as_ref().and_then(WorkerHandle::pid),
            worker_generation: self.generation,
            cycles_executed: self.state.cycles_executed(),
            failures_detected: self.state.failures_detected(),
            last_activity_at: self.state.last_activity_at(),
            monitor_ticks: self.monitor_ticks,
            last_health: self.last_health.clone(),
            last_decision: self.last_decision,
            last_exit: self.last_exit.clone(),
        };
        self.status_tx.send_replace(report);
    }
}
