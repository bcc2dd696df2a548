use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "vigil")]
#[command(version = BUILD_VERSION)]
#[command(about = "Vigil - keeps one critical worker process alive under a restart budget")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(short, long, global = true, value_name = "FILE", help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(short = 'd', long, global = true, value_name = "DIR", env = "VIGIL_DATA_DIR", help = "Data directory path")]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Write logs to file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text", help = "Output format")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the supervisor in the foreground")]
    #[command(long_about = "Launch the configured worker and supervise it until SIGTERM or SIGINT.\n\nThe worker is restarted on inactivity, crashes, critical health or repeated anomalies, up to policy.max_restarts times.")]
    Run {
        #[arg(long, value_name = "FILE", help = "Write PID to file (default: <data-dir>/vigil.pid)")]
        pid_file: Option<PathBuf>,
    },

    #[command(about = "Show the running supervisor's status")]
    Status,

    #[command(about = "Show recent audit events")]
    Events {
        #[arg(short, long, default_value = "20", help = "Number of events to show")]
        limit: usize,
    },

    #[command(about = "Reset the restart budget and resume automatic restarts")]
    Reset,

    #[command(about = "Stop a running supervisor")]
    Stop {
        #[arg(short, long, help = "Send SIGKILL instead of SIGTERM")]
        force: bool,
    },

    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    #[command(about = "Show version information")]
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show effective configuration (worker env values hidden)")]
    Show,
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(short, long, help = "Overwrite existing configuration")]
        force: bool,
        #[arg(long, value_name = "PROGRAM", help = "Worker executable to supervise")]
        program: Option<String>,
    },
    #[command(about = "Validate configuration")]
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vigil", "events", "--limit", "5", "-vv", "--format", "json", "--data-dir", "/tmp/vigil",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/vigil")));
        assert!(matches!(cli.command, Commands::Events { limit: 5 }));
    }

    #[test]
    fn test_parse_config_init() {
        let cli = Cli::try_parse_from(["vigil", "config", "init", "--force", "--program", "/opt/bot/run"]).unwrap();
        match cli.command {
            Commands::Config {
                action: Some(ConfigAction::Init { force, program }),
            } => {
                assert!(force);
                assert_eq!(program.as_deref(), Some("/opt/bot/run"));
            }
            _ => panic!("expected config init"),
        }
    }
}
