use std::path::Path;
use vigil_daemon::config::SupervisorConfig;
use vigil_types::{VigilError, VigilResult};

use super::commands::{ConfigAction, OutputFormat};

pub fn handle_config(
    config_path: &Path,
    data_dir: Option<&Path>,
    action: Option<ConfigAction>,
    format: OutputFormat,
) -> VigilResult<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            if !config_path.exists() {
                println!("\x1b[38;5;245mNo configuration file found at {:?}, showing defaults\x1b[0m", config_path);
            }
            let mut config = SupervisorConfig::load_unvalidated(config_path)?;
            if let Some(dir) = data_dir {
                config.data_dir = dir.to_path_buf();
            }

            match format {
                OutputFormat::Text => print!("{}", config.redacted()),
                OutputFormat::Json => {
                    let mut value = serde_json::to_value(&config)
                        .map_err(|e| VigilError::Serialization(e.to_string()))?;
                    if let Some(env) = value.pointer_mut("/worker/env").and_then(|v| v.as_object_mut()) {
                        for v in env.values_mut() {
                            *v = serde_json::Value::String("<hidden>".into());
                        }
                    }
                    let json = serde_json::to_string_pretty(&value)
                        .map_err(|e| VigilError::Serialization(e.to_string()))?;
                    println!("{}", json);
                }
            }
        }
        Some(ConfigAction::Init { force, program }) => {
            if config_path.exists() && !force {
                return Err(VigilError::Config(format!(
                    "Configuration already exists at {:?} (use --force to overwrite)",
                    config_path
                )));
            }

            let mut config = SupervisorConfig::default();
            if let Some(dir) = data_dir {
                config.data_dir = dir.to_path_buf();
            }
            if let Some(program) = program {
                config.worker.program = program;
            }
            config.save(config_path)?;

            println!("\x1b[38;5;46m[+]\x1b[0m Configuration written to {:?}", config_path);
            if config.worker.program.is_empty() {
                println!("    Set worker.program before running 'vigil run'");
            }
        }
        Some(ConfigAction::Validate) => {
            if !config_path.exists() {
                println!("\x1b[38;5;245mNo configuration file found at {:?}\x1b[0m", config_path);
                return Ok(());
            }
            match SupervisorConfig::load(config_path) {
                Ok(_) => println!("\x1b[38;5;46m[+]\x1b[0m Configuration is valid"),
                Err(e) => {
                    println!("\x1b[38;5;196m[-]\x1b[0m Configuration error: {}", e);
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}
