#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod health;
pub mod restart;
pub mod storage;
pub mod supervisor;
pub mod worker;

pub use api::{ApiServer, SupervisorClient};
pub use config::{RestartPolicy, SupervisorConfig};
pub use health::HealthAnalyzer;
pub use restart::{should_restart, RestartDecision, RestartReason};
pub use storage::{StorageConfig, SupervisorStorage, SupervisorStore};
pub use supervisor::{
    CancellationToken, IntervalTicker, ManualTicker, StatusReport, Supervisor, SupervisorHandle,
    SupervisorPhase, SupervisorState,
};
pub use worker::{CommandLauncher, Launcher, WorkerHandle};
