use super::*;
use crate::config::{HealthConfig, RestartPolicy, WorkerConfig};
use crate::restart::RestartReason;
use crate::storage::{EvidenceRecord, SupervisorStorage, SupervisorStore};
use crate::worker::{CommandLauncher, Launcher, WorkerEventSender, WorkerHandle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use chrono::Utc;
use vigil_types::{EventKind, EventRecord, MetricKind, Severity, VigilError, VigilResult};

const SCENARIO_TIMEOUT: Duration = Duration::from_secs(20);

/// Counts every launch attempt made by the supervisor.
struct CountingLauncher {
    inner: CommandLauncher,
    launches: AtomicUsize,
}

impl CountingLauncher {
    fn new(config: WorkerConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: CommandLauncher::new(config).unwrap(),
            launches: AtomicUsize::new(0),
        })
    }

    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl Launcher for CountingLauncher {
    fn launch(&self, generation: u64, events: WorkerEventSender) -> VigilResult<WorkerHandle> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.inner.launch(generation, events)
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

fn shell(script: &str) -> WorkerConfig {
    WorkerConfig {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        ..WorkerConfig::default()
    }
}

fn fast_policy(max_restarts: u32) -> RestartPolicy {
    RestartPolicy {
        max_restarts,
        grace_period_secs: 2,
        restart_cooldown_secs: 0,
        ..RestartPolicy::default()
    }
}

struct Harness {
    storage: Arc<SupervisorStorage>,
    handle: SupervisorHandle,
    ticks: ManualTickerHandle,
    maintenance: ManualTickerHandle,
    shutdown: CancellationToken,
    task: JoinHandle<VigilResult<SupervisorState>>,
}

fn launch_supervisor(launcher: Arc<dyn Launcher>, policy: RestartPolicy) -> Harness {
    let storage = Arc::new(SupervisorStorage::open_memory().unwrap());
    let store: Arc<dyn SupervisorStore> = storage.clone();
    let (supervisor, handle) = Supervisor::new(launcher, store, policy, HealthConfig::default());

    let (monitor, ticks) = ManualTicker::new();
    let (maintenance_ticker, maintenance) = ManualTicker::new();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(supervisor.run(monitor, maintenance_ticker, shutdown.clone()));

    Harness {
        storage,
        handle,
        ticks,
        maintenance,
        shutdown,
        task,
    }
}

impl Harness {
    async fn wait_for<F>(&mut self, predicate: F) -> StatusReport
    where
        F: FnMut(&StatusReport) -> bool,
    {
        tokio::time::timeout(SCENARIO_TIMEOUT, self.handle.wait_for(predicate))
            .await
            .expect("supervisor did not reach the expected status in time")
            .unwrap()
    }

    fn events(&self, kind: EventKind) -> Vec<EventRecord> {
        self.storage
            .recent_events(1_000)
            .unwrap()
            .into_iter()
            .filter(|event| event.kind == kind)
            .collect()
    }

    /// For transitions that do not publish a status, such as maintenance.
    async fn wait_for_event(&self, kind: EventKind) -> EventRecord {
        let deadline = tokio::time::Instant::now() + SCENARIO_TIMEOUT;
        loop {
            if let Some(event) = self.events(kind).into_iter().next() {
                return event;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "no {} event recorded in time",
                kind
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn shutdown(self) -> SupervisorState {
        self.shutdown.cancel();
        tokio::time::timeout(SCENARIO_TIMEOUT, self.task)
            .await
            .expect("supervisor did not shut down in time")
            .unwrap()
            .unwrap()
    }
}

#[tokio::test]
async fn test_crashing_worker_exhausts_budget_and_opens_circuit() {
    let launcher = CountingLauncher::new(shell("exit 3"));
    let mut harness = launch_supervisor(launcher.clone(), fast_policy(3));

    let status = harness
        .wait_for(|s| s.phase == SupervisorPhase::CircuitOpen)
        .await;

    assert_eq!(launcher.launches(), 4);
    assert_eq!(status.restarts_performed, 3);
    assert_eq!(status.budget_remaining(), 0);
    assert!(!status.worker_active);
    assert_eq!(
        status.last_decision.map(|d| d.reason),
        Some(RestartReason::BudgetExhausted)
    );
    assert_eq!(status.last_exit.as_ref().and_then(|e| e.code), Some(3));

    assert_eq!(harness.events(EventKind::WorkerStarted).len(), 4);
    assert_eq!(harness.events(EventKind::WorkerExited).len(), 4);
    assert_eq!(harness.events(EventKind::RestartTriggered).len(), 3);

    let exhausted = harness.events(EventKind::RestartBudgetExhausted);
    assert_eq!(exhausted.len(), 1);
    assert_eq!(exhausted[0].severity, Severity::Critical);

    // Further ticks are skipped while the circuit is open.
    assert!(harness.ticks.tick());
    harness.wait_for(|s| s.monitor_ticks == 1).await;
    assert_eq!(launcher.launches(), 4);
    assert_eq!(harness.events(EventKind::RestartBudgetExhausted).len(), 1);

    let state = harness.shutdown().await;
    assert_eq!(state.restarts_performed(), 3);
}

#[tokio::test]
async fn test_budget_reset_relaunches_worker() {
    let launcher = CountingLauncher::new(shell("exit 3"));
    let mut harness = launch_supervisor(launcher.clone(), fast_policy(1));

    harness
        .wait_for(|s| s.phase == SupervisorPhase::CircuitOpen)
        .await;
    assert_eq!(launcher.launches(), 2);

    let cleared = harness.handle.reset_restart_budget().await.unwrap();
    assert_eq!(cleared, 1);

    let status = harness
        .wait_for(|s| s.phase == SupervisorPhase::CircuitOpen && s.worker_generation == 4)
        .await;
    assert_eq!(launcher.launches(), 4);
    assert_eq!(status.restarts_performed, 1);

    assert_eq!(harness.events(EventKind::RestartBudgetReset).len(), 1);
    assert_eq!(harness.events(EventKind::RestartBudgetExhausted).len(), 2);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_inactivity_restart_resets_failures_and_records_health_first() {
    let marker = std::env::temp_dir().join(format!("vigil-marker-{}", uuid::Uuid::new_v4()));
    let mut config = shell(
        "if [ ! -e \"$MARKER\" ]; then : > \"$MARKER\"; \
         echo 'warning: queue is slow'; echo 'warning: queue is slow'; fi; \
         echo ready; exec sleep 30",
    );
    config
        .env
        .insert("MARKER".to_string(), marker.display().to_string());

    let launcher = CountingLauncher::new(config);
    let policy = RestartPolicy {
        inactivity_timeout_secs: 1,
        ..fast_policy(5)
    };
    let mut harness = launch_supervisor(launcher.clone(), policy);

    let before = harness
        .wait_for(|s| s.phase == SupervisorPhase::Running && s.failures_detected == 2)
        .await;

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(harness.ticks.tick());

    let after = harness
        .wait_for(|s| s.restarts_performed == 1 && s.phase == SupervisorPhase::Running)
        .await;

    assert_eq!(launcher.launches(), 2);
    assert_eq!(after.failures_detected, 0);
    assert!(after.last_activity_at > before.last_activity_at);
    assert_eq!(
        after.last_decision.map(|d| d.reason),
        Some(RestartReason::InactivityTimeout)
    );

    let triggered = harness.events(EventKind::RestartTriggered);
    assert_eq!(triggered.len(), 1);
    let health = harness
        .storage
        .recent_metrics(Some(MetricKind::HealthStatus), 10)
        .unwrap();
    assert_eq!(health.len(), 1);
    assert!(health[0].timestamp <= triggered[0].timestamp);

    let stopped = harness.events(EventKind::WorkerStopped);
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].severity, Severity::Info);
    assert_eq!(stopped[0].details["context"], "restart");

    harness.shutdown().await;
    let _ = std::fs::remove_file(&marker);
}

#[tokio::test]
async fn test_nominal_tick_records_cycle_metrics() {
    let launcher = CountingLauncher::new(shell(
        "echo ready; echo 'cycle 1 complete'; echo 'cycle 2 complete'; exec sleep 30",
    ));
    let mut harness = launch_supervisor(launcher.clone(), fast_policy(5));

    harness.wait_for(|s| s.cycles_executed == 2).await;
    assert!(harness.ticks.tick());
    let status = harness.wait_for(|s| s.monitor_ticks == 1).await;

    assert_eq!(status.restarts_performed, 0);
    assert_eq!(
        status.last_decision.map(|d| d.reason),
        Some(RestartReason::Nominal)
    );

    let cycles = harness
        .storage
        .recent_metrics(Some(MetricKind::CyclesExecuted), 10)
        .unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].value, 2.0);
    assert_eq!(launcher.launches(), 1);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_worker_gracefully() {
    let launcher = CountingLauncher::new(shell("echo ready; exec sleep 30"));
    let mut harness = launch_supervisor(launcher, fast_policy(5));

    let running = harness
        .wait_for(|s| s.phase == SupervisorPhase::Running)
        .await;
    let pid = running.worker_pid.unwrap();

    let storage = harness.storage.clone();
    let handle = harness.handle.clone();
    harness.shutdown().await;

    let final_status = handle.status();
    assert_eq!(final_status.phase, SupervisorPhase::Stopped);
    assert!(!final_status.worker_active);

    let events = storage.recent_events(100).unwrap();
    let stopped = events
        .iter()
        .find(|e| e.kind == EventKind::WorkerStopped)
        .unwrap();
    assert_eq!(stopped.severity, Severity::Info);
    assert_eq!(stopped.details["outcome"], "graceful");
    assert_eq!(events.last().unwrap().kind, EventKind::SupervisorStopped);

    let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None);
    assert!(alive.is_err());
}

#[tokio::test]
async fn test_initial_spawn_failure_is_returned() {
    let launcher = CountingLauncher::new(WorkerConfig {
        program: "/nonexistent/vigil-test-worker".to_string(),
        ..WorkerConfig::default()
    });
    let harness = launch_supervisor(launcher.clone(), fast_policy(5));

    let result = tokio::time::timeout(SCENARIO_TIMEOUT, harness.task)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(result, Err(VigilError::Spawn(_))));
    assert_eq!(launcher.launches(), 1);
    assert_eq!(harness.handle.status().phase, SupervisorPhase::Stopped);

    let events = harness.storage.recent_events(100).unwrap();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::SupervisorStarted,
            EventKind::SpawnFailed,
            EventKind::SupervisorStopped,
        ]
    );
    assert_eq!(events[1].severity, Severity::Critical);
}

/// First launch crashes, the relaunch fails to spawn, later launches stay up.
struct RelaunchFailingLauncher {
    crashing: CommandLauncher,
    steady: CommandLauncher,
    launches: AtomicUsize,
}

impl Launcher for RelaunchFailingLauncher {
    fn launch(&self, generation: u64, events: WorkerEventSender) -> VigilResult<WorkerHandle> {
        match self.launches.fetch_add(1, Ordering::SeqCst) + 1 {
            1 => self.crashing.launch(generation, events),
            2 => Err(VigilError::Spawn("executable vanished".to_string())),
            _ => self.steady.launch(generation, events),
        }
    }

    fn describe(&self) -> String {
        self.steady.describe()
    }
}

#[tokio::test]
async fn test_crash_output_is_recorded_before_exit() {
    for _ in 0..5 {
        let launcher = CountingLauncher::new(shell("echo 'ERROR fatal: db gone' 1>&2; exit 1"));
        let mut harness = launch_supervisor(launcher.clone(), fast_policy(0));

        let status = harness
            .wait_for(|s| s.phase == SupervisorPhase::CircuitOpen)
            .await;
        assert_eq!(launcher.launches(), 1);
        assert_eq!(status.failures_detected, 1);

        let anomalies = harness.events(EventKind::WorkerAnomaly);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].description, "ERROR fatal: db gone");
        assert_eq!(anomalies[0].details["stream"], "stderr");

        harness.shutdown().await;
    }
}

#[tokio::test]
async fn test_relaunch_spawn_failure_halts_until_reset() {
    let launcher = Arc::new(RelaunchFailingLauncher {
        crashing: CommandLauncher::new(shell("exit 3")).unwrap(),
        steady: CommandLauncher::new(shell("echo ready; exec sleep 30")).unwrap(),
        launches: AtomicUsize::new(0),
    });
    let mut harness = launch_supervisor(launcher.clone(), fast_policy(5));

    let halted = harness
        .wait_for(|s| s.phase == SupervisorPhase::Stopped && s.worker_generation == 2)
        .await;
    assert!(!halted.worker_active);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    assert_eq!(harness.events(EventKind::SpawnFailed).len(), 1);

    assert!(harness.ticks.tick());
    assert!(harness.ticks.tick());
    let status = harness.wait_for(|s| s.monitor_ticks == 2).await;
    assert_eq!(status.phase, SupervisorPhase::Stopped);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);

    let cleared = harness.handle.reset_restart_budget().await.unwrap();
    assert_eq!(cleared, 1);

    let resumed = harness
        .wait_for(|s| s.phase == SupervisorPhase::Running && s.worker_generation == 3)
        .await;
    assert!(resumed.worker_active);
    assert_eq!(resumed.restarts_performed, 0);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 3);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_during_cooldown_skips_relaunch() {
    let launcher = CountingLauncher::new(shell("exit 3"));
    let policy = RestartPolicy {
        restart_cooldown_secs: 30,
        ..fast_policy(5)
    };
    let harness = launch_supervisor(launcher.clone(), policy);

    harness.wait_for_event(EventKind::RestartTriggered).await;
    let handle = harness.handle.clone();

    // Returns well before the 30s cooldown would have elapsed.
    let state = harness.shutdown().await;

    assert_eq!(launcher.launches(), 1);
    assert_eq!(state.restarts_performed(), 0);
    assert_eq!(handle.status().phase, SupervisorPhase::Stopped);
}

#[tokio::test]
async fn test_maintenance_tick_prunes_and_records_retention() {
    let launcher = CountingLauncher::new(shell("echo ready; exec sleep 30"));
    let mut harness = launch_supervisor(launcher, fast_policy(5));
    harness
        .wait_for(|s| s.phase == SupervisorPhase::Running)
        .await;

    let aged = Utc::now() - chrono::Duration::days(10);
    harness
        .storage
        .append_event(&EventRecord::info(EventKind::WorkerReady, "aged ready").at(aged))
        .unwrap();
    harness
        .storage
        .record_evidence(&EvidenceRecord::new("batch_uploaded").at(aged))
        .unwrap();

    assert!(harness.maintenance.tick());
    let pruned = harness.wait_for_event(EventKind::RetentionPruned).await;

    assert_eq!(pruned.details["events"], 1);
    assert_eq!(pruned.details["evidence"], 1);
    assert!(harness
        .storage
        .recent_events(100)
        .unwrap()
        .iter()
        .all(|e| e.description != "aged ready"));

    harness.shutdown().await;
}
