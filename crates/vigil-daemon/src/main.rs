mod cli;

use clap::Parser;
use cli::{
    handle_config, init_logging, reset_budget, resolve_paths, run_supervisor, show_events,
    show_status, show_version, stop_supervisor, Cli, Commands,
};
use vigil_daemon::config::{LoggingConfig, SupervisorConfig};
use vigil_types::VigilResult;

#[tokio::main]
async fn main() -> VigilResult<()> {
    let cli = Cli::parse();
    let (data_dir, config_path) = resolve_paths(&cli);

    let loaded = SupervisorConfig::load_unvalidated(&config_path).map(|mut config| {
        if let Some(dir) = &data_dir {
            config.data_dir = dir.clone();
        }
        config
    });

    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    init_logging(&cli, &logging)?;

    match cli.command {
        Commands::Run { pid_file } => {
            run_supervisor(loaded?, pid_file).await?;
        }
        Commands::Status => {
            show_status(&loaded?, cli.format).await?;
        }
        Commands::Events { limit } => {
            show_events(&loaded?, limit, cli.format).await?;
        }
        Commands::Reset => {
            reset_budget(&loaded?, cli.format).await?;
        }
        Commands::Stop { force } => {
            stop_supervisor(&loaded?.data_dir, force).await?;
        }
        Commands::Config { action } => {
            handle_config(&config_path, data_dir.as_deref(), action, cli.format)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}
