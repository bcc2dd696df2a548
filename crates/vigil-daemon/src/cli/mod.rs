mod commands;
mod config_cmd;
mod remote;
mod run;
mod utils;

pub use commands::{Cli, Commands, ConfigAction, OutputFormat};
pub use config_cmd::handle_config;
pub use remote::{reset_budget, show_events, show_status, stop_supervisor};
pub use run::run_supervisor;
pub use utils::{init_logging, resolve_paths, show_version};
