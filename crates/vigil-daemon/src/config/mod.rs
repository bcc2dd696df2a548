mod api;
mod constants;
mod health;
mod logging;
mod policy;
mod storage;
mod supervisor;
mod types;
mod worker;

pub use api::ApiConfig;
pub use constants::*;
pub use health::HealthConfig;
pub use logging::LoggingConfig;
pub use policy::RestartPolicy;
pub use storage::StoreConfig;
pub use supervisor::{RedactedConfig, SupervisorConfig};
pub use types::*;
pub use worker::{PatternConfig, WorkerConfig};
