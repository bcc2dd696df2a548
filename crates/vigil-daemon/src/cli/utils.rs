use super::commands::Cli;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vigil_daemon::config::{LoggingConfig, DEFAULT_CONFIG_FILE};
use vigil_types::{VigilError, VigilResult};

pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolves the data directory and config path from flags and defaults.
pub fn resolve_paths(cli: &Cli) -> (Option<PathBuf>, PathBuf) {
    let data_dir = cli.data_dir.clone();
    let base = data_dir.clone().unwrap_or_else(|| {
        dirs::home_dir()
            .map(|h| h.join(".vigil"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/vigil"))
    });
    let config_path = cli.config.clone().unwrap_or_else(|| base.join(DEFAULT_CONFIG_FILE));
    (data_dir, config_path)
}

/// `-q` and `-v` win over the config file; `RUST_LOG` wins over both.
pub fn filter_directive(cli: &Cli, logging: &LoggingConfig) -> String {
    if cli.quiet {
        return "warn".to_string();
    }
    match cli.verbose {
        0 => logging.filter_directive(),
        1 => "info,vigil_daemon=debug".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

pub fn init_logging(cli: &Cli, logging: &LoggingConfig) -> VigilResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(cli, logging)));

    let registry = tracing_subscriber::registry().with(env_filter);
    let log_file = cli.log_file.clone().or_else(|| logging.file.clone());

    let file = match log_file {
        Some(path) => Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| VigilError::Config(format!("Failed to open log file {:?}: {}", path, e)))?,
        ),
        None => None,
    };

    let result = match (file, logging.json) {
        (Some(file), true) => registry
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .try_init(),
        (Some(file), false) => registry
            .with(
                fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .try_init(),
        (None, true) => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        (None, false) => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(cli.verbose >= 2),
            )
            .try_init(),
    };

    result.map_err(|e| VigilError::Internal(format!("Failed to initialize logging: {}", e)))
}

pub fn show_version() {
    println!("vigil {}", BUILD_VERSION);
}
