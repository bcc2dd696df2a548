use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use vigil_daemon::api::ApiServer;
use vigil_daemon::config::{SupervisorConfig, PID_FILE};
use vigil_daemon::storage::{StorageConfig, SupervisorStorage};
use vigil_daemon::supervisor::{CancellationToken, IntervalTicker, Supervisor};
use vigil_daemon::worker::CommandLauncher;
use vigil_types::{VigilError, VigilResult};

use super::utils::BUILD_VERSION;

pub async fn run_supervisor(config: SupervisorConfig, pid_file: Option<PathBuf>) -> VigilResult<()> {
    info!("Starting vigil v{}", BUILD_VERSION);
    config.validate()?;
    info!("Effective configuration:\n{}", config.redacted());

    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| VigilError::Config(format!("Failed to create data directory: {}", e)))?;

    let pid_path = pid_file.unwrap_or_else(|| config.data_dir.join(PID_FILE));
    write_pid_file(&pid_path)?;

    let result = supervise(&config).await;

    if let Err(e) = std::fs::remove_file(&pid_path) {
        warn!("Failed to remove PID file {:?}: {}", pid_path, e);
    }

    match result {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Supervisor exited with error: {}", e);
            Err(e)
        }
    }
}

async fn supervise(config: &SupervisorConfig) -> VigilResult<()> {
    let storage = Arc::new(SupervisorStorage::open(StorageConfig::from_supervisor(config))?);
    let launcher = Arc::new(CommandLauncher::new(config.worker.clone())?);

    let (supervisor, handle) = Supervisor::new(
        launcher,
        storage.clone(),
        config.policy.clone(),
        config.health.clone(),
    );
    let shutdown = CancellationToken::new();

    let api_task = if config.api.enabled {
        let server = ApiServer::new(&config.api, storage.clone(), handle.clone());
        let listener = server.bind().await?;
        let token = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.serve_on(listener, token).await {
                error!("API server error: {}", e);
            }
        }))
    } else {
        info!("API server disabled");
        None
    };

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        signal_token.cancel();
    });

    let monitor = IntervalTicker::new(config.policy.monitoring_interval());
    let maintenance = IntervalTicker::new(config.policy.maintenance_interval());
    let result = supervisor.run(monitor, maintenance, shutdown.clone()).await;

    shutdown.cancel();
    if let Some(task) = api_task {
        if let Err(e) = task.await {
            warn!("API task ended abnormally: {}", e);
        }
    }

    let state = result?;
    info!(
        "Supervised for {}s: {} restarts, {} cycles",
        state.uptime(chrono::Utc::now()).as_secs(),
        state.restarts_performed(),
        state.cycles_executed()
    );
    Ok(())
}

fn write_pid_file(path: &Path) -> VigilResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| VigilError::Config(format!("Failed to create PID directory: {}", e)))?;
    }
    std::fs::write(path, std::process::id().to_string())
        .map_err(|e| VigilError::Config(format!("Failed to write PID file: {}", e)))?;
    info!("PID file written: {:?}", path);
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => { info!("Received SIGTERM"); }
            _ = sigint.recv() => { info!("Received SIGINT"); }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C");
    }
}
