use std::path::Path;
use std::time::Duration;
use vigil_daemon::api::{HealthResponse, StatusResponse, SupervisorClient};
use vigil_daemon::config::{SupervisorConfig, PID_FILE};
use vigil_types::{EventRecord, Severity, VigilError, VigilResult};

use super::commands::OutputFormat;

fn client(config: &SupervisorConfig) -> VigilResult<SupervisorClient> {
    SupervisorClient::new(
        config.api.base_url(),
        Duration::from_secs(config.api.request_timeout_secs),
    )
}

fn print_json<T: serde::Serialize>(value: &T) -> VigilResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| VigilError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

pub async fn show_status(config: &SupervisorConfig, format: OutputFormat) -> VigilResult<()> {
    let client = client(config)?;
    let status = match client.status().await {
        Ok(status) => status,
        Err(e) => {
            println!("\x1b[38;5;196m[-]\x1b[0m Supervisor not reachable at {}", client.base_url());
            return Err(e);
        }
    };
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "status": status, "health": health })),
        OutputFormat::Text => {
            print_status(&status, &health);
            Ok(())
        }
    }
}

fn print_status(status: &StatusResponse, health: &HealthResponse) {
    let report = &status.supervisor;
    let marker = if health.healthy {
        "\x1b[38;5;46m[+]\x1b[0m"
    } else {
        "\x1b[38;5;196m[-]\x1b[0m"
    };

    println!("{} Supervisor {} (health: {})", marker, report.phase, health.status);
    println!("    Uptime:        {}s", report.uptime_secs);
    match report.worker_pid {
        Some(pid) if report.worker_active => {
            println!("    Worker:        generation {} (pid {})", report.worker_generation, pid)
        }
        _ => println!("    Worker:        not running"),
    }
    println!(
        "    Restarts:      {}/{} ({} remaining)",
        report.restarts_performed,
        report.max_restarts,
        report.budget_remaining()
    );
    println!("    Cycles:        {}", report.cycles_executed);
    println!("    Failures:      {}", report.failures_detected);
    println!("    Last activity: {}", report.last_activity_at.to_rfc3339());

    if let Some(snapshot) = &report.last_health {
        println!(
            "    Evidence:      records={} dependencies={}/{} errors={}",
            snapshot.recent_record_count,
            snapshot.healthy_dependency_count,
            snapshot.total_dependency_count,
            snapshot.recent_error_count
        );
    }
    if let Some(decision) = &report.last_decision {
        println!("    Last decision: {} ({})", decision.reason, if decision.restart { "restart" } else { "hold" });
    }
    if let Some(exit) = &report.last_exit {
        println!("    Last exit:     {} at {}", exit, exit.at.to_rfc3339());
    }
    println!(
        "    Store:         {} events, {} metrics, {} evidence, {} errors",
        status.storage.events_appended,
        status.storage.metrics_appended,
        status.storage.evidence_appended,
        status.storage.errors
    );
}

pub async fn show_events(config: &SupervisorConfig, limit: usize, format: OutputFormat) -> VigilResult<()> {
    let events = client(config)?.events(limit).await?;

    match format {
        OutputFormat::Json => print_json(&events),
        OutputFormat::Text => {
            if events.is_empty() {
                println!("\x1b[38;5;245mNo events recorded\x1b[0m");
            }
            for event in &events {
                print_event(event);
            }
            Ok(())
        }
    }
}

fn print_event(event: &EventRecord) {
    let color = match event.severity {
        Severity::Info => "245",
        Severity::Warning => "226",
        Severity::Error => "208",
        Severity::Critical => "196",
    };
    println!(
        "{} \x1b[38;5;{}m{:<8}\x1b[0m {:<24} {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        color,
        event.severity,
        event.kind,
        event.description
    );
}

pub async fn reset_budget(config: &SupervisorConfig, format: OutputFormat) -> VigilResult<()> {
    let cleared = client(config)?.reset_restart_budget().await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "cleared": cleared })),
        OutputFormat::Text => {
            println!("\x1b[38;5;46m[+]\x1b[0m Restart budget reset ({} restarts cleared)", cleared);
            Ok(())
        }
    }
}

pub async fn stop_supervisor(data_dir: &Path, force: bool) -> VigilResult<()> {
    let pid_file = data_dir.join(PID_FILE);
    if !pid_file.exists() {
        println!("\x1b[38;5;245mNo PID file found. Supervisor may not be running.\x1b[0m");
        return Ok(());
    }

    let pid_str = std::fs::read_to_string(&pid_file)
        .map_err(|e| VigilError::Process(format!("Failed to read PID: {}", e)))?;
    let pid: i32 = pid_str
        .trim()
        .parse()
        .map_err(|e| VigilError::Process(format!("Invalid PID: {}", e)))?;

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
        kill(Pid::from_raw(pid), signal)
            .map_err(|e| VigilError::Process(format!("Failed to signal process {}: {}", pid, e)))?;
        println!("\x1b[38;5;46m[+]\x1b[0m Sent {} to process {}", signal.as_str(), pid);
    }

    #[cfg(not(unix))]
    {
        let _ = (pid, force);
        println!("Stop not supported on this platform. Kill process {} manually.", pid);
    }

    Ok(())
}
