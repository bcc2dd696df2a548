use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use vigil_types::{VigilError, VigilResult};

use super::api::ApiConfig;
use super::health::HealthConfig;
use super::logging::LoggingConfig;
use super::policy::RestartPolicy;
use super::storage::StoreConfig;
use super::types::LogLevel;
use super::worker::WorkerConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub data_dir: PathBuf,
    pub worker: WorkerConfig,
    pub policy: RestartPolicy,
    pub health: HealthConfig,
    pub storage: StoreConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".vigil"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/vigil"));

        Self {
            data_dir,
            worker: WorkerConfig::default(),
            policy: RestartPolicy::default(),
            health: HealthConfig::default(),
            storage: StoreConfig::default(),
            logging: LoggingConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl SupervisorConfig {
    pub fn load(path: impl AsRef<Path>) -> VigilResult<Self> {
        let mut config = Self::load_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the file (or defaults) and applies environment overrides.
    pub fn load_unvalidated(path: impl AsRef<Path>) -> VigilResult<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| VigilError::Config(format!("Failed to read config: {}", e)))?;

            toml::from_str(&contents)
                .map_err(|e| VigilError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> VigilResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| VigilError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VigilError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path.as_ref(), contents)
            .map_err(|e| VigilError::Config(format!("Failed to write config: {}", e)))?;

        info!("Configuration saved to {:?}", path.as_ref());
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("VIGIL_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(program) = std::env::var("VIGIL_WORKER_PROGRAM") {
            if !program.trim().is_empty() {
                self.worker.program = program;
            }
        }

        if let Ok(max) = std::env::var("VIGIL_MAX_RESTARTS") {
            if let Ok(m) = max.parse() {
                self.policy.max_restarts = m;
            }
        }

        if let Ok(port) = std::env::var("VIGIL_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        if let Ok(bind) = std::env::var("VIGIL_API_BIND") {
            if let Ok(addr) = bind.parse::<IpAddr>() {
                self.api.bind_address = addr;
                if !addr.is_loopback() {
                    warn!(
                        "API server binding to non-localhost address: {}. Evidence ingestion is unauthenticated.",
                        bind
                    );
                }
            }
        }

        if let Ok(level) = std::env::var("VIGIL_LOG_LEVEL") {
            self.logging.level = LogLevel::parse_lenient(&level);
        }

        if std::env::var("VIGIL_LOG_JSON").is_ok() {
            self.logging.json = true;
        }
    }

    pub fn validate(&self) -> VigilResult<()> {
        if self.worker.program.trim().is_empty() {
            return Err(VigilError::Config(
                "worker.program must name the executable to supervise".into(),
            ));
        }

        if self.policy.monitoring_interval_secs == 0 {
            return Err(VigilError::Config("Monitoring interval cannot be 0".into()));
        }

        if self.policy.inactivity_timeout_secs == 0 {
            return Err(VigilError::Config("Inactivity timeout cannot be 0".into()));
        }

        if self.policy.retention_days == 0 {
            return Err(VigilError::Config("Retention window must be at least 1 day".into()));
        }

        if self.policy.maintenance_interval_secs == 0 {
            return Err(VigilError::Config("Maintenance interval cannot be 0".into()));
        }

        if self.health.read_timeout_ms == 0 || self.health.write_timeout_ms == 0 {
            return Err(VigilError::Config("Store timeouts cannot be 0".into()));
        }

        if self.api.enabled && self.api.port == 0 {
            return Err(VigilError::Config("API port cannot be 0".into()));
        }

        let patterns = &self.worker.patterns;
        for pattern in patterns.startup.iter().chain(&patterns.progress).chain(&patterns.anomaly) {
            Regex::new(pattern).map_err(|e| {
                VigilError::Config(format!("Invalid output pattern '{}': {}", pattern, e))
            })?;
        }

        if self.policy.inactivity_timeout_secs < self.policy.monitoring_interval_secs {
            warn!(
                "Inactivity timeout ({}s) is shorter than the monitoring interval ({}s); inactivity is only checked once per tick",
                self.policy.inactivity_timeout_secs, self.policy.monitoring_interval_secs
            );
        }

        if self.policy.max_restarts == 0 {
            warn!("max_restarts is 0 - the worker will never be restarted automatically");
        }

        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.storage.resolve_path(&self.data_dir)
    }

    pub fn redacted(&self) -> RedactedConfig {
        RedactedConfig {
            data_dir: self.data_dir.clone(),
            command: self.worker.command_line(),
            env_keys: self.worker.env.keys().cloned().collect(),
            policy: self.policy.clone(),
            store_path: self.store_path(),
            api_enabled: self.api.enabled,
            api_bind: self.api.bind_address,
            api_port: self.api.port,
            log_level: self.logging.level,
        }
    }
}

/// Printable view of the config; worker env values are withheld.
#[derive(Debug)]
pub struct RedactedConfig {
    pub data_dir: PathBuf,
    pub command: String,
    pub env_keys: Vec<String>,
    pub policy: RestartPolicy,
    pub store_path: PathBuf,
    pub api_enabled: bool,
    pub api_bind: IpAddr,
    pub api_port: u16,
    pub log_level: LogLevel,
}

impl std::fmt::Display for RedactedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Vigil Supervisor Configuration")?;
        writeln!(f, "==============================")?;
        writeln!(f, "Data dir: {:?}", self.data_dir)?;
        writeln!(f, "Worker: {}", self.command)?;
        if !self.env_keys.is_empty() {
            writeln!(f, "Worker env overrides: {} (values hidden)", self.env_keys.join(", "))?;
        }
        writeln!(f, "Policy:")?;
        writeln!(f, "  inactivity timeout: {}s", self.policy.inactivity_timeout_secs)?;
        writeln!(f, "  monitoring interval: {}s", self.policy.monitoring_interval_secs)?;
        writeln!(f, "  max restarts: {}", self.policy.max_restarts)?;
        writeln!(f, "  grace period: {}s", self.policy.grace_period_secs)?;
        writeln!(f, "  cooldown: {}s ({})", self.policy.restart_cooldown_secs, self.policy.backoff)?;
        writeln!(f, "  retention: {} days", self.policy.retention_days)?;
        writeln!(f, "Store: {:?}", self.store_path)?;
        if self.api_enabled {
            writeln!(f, "API: {}:{}", self.api_bind, self.api_port)?;
        } else {
            writeln!(f, "API: disabled")?;
        }
        writeln!(f, "Log level: {}", self.log_level)?;
        Ok(())
    }
}
