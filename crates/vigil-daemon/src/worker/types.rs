use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use vigil_types::Severity;

/// Classification of a single output line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSignal {
    StartupComplete,
    Progress,
    Anomaly,
    Unrecognized,
}

impl LineSignal {
    pub fn is_recognized(&self) -> bool {
        !matches!(self, LineSignal::Unrecognized)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub at: DateTime<Utc>,
}

impl WorkerExit {
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            at: Utc::now(),
        }
    }

    /// Exit whose status could not be collected.
    pub fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
            at: Utc::now(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn severity(&self) -> Severity {
        if self.success() {
            Severity::Info
        } else {
            Severity::Error
        }
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Graceful(WorkerExit),
    Forced(WorkerExit),
}

impl StopOutcome {
    pub fn exit(&self) -> &WorkerExit {
        match self {
            StopOutcome::Graceful(exit) | StopOutcome::Forced(exit) => exit,
        }
    }

    pub fn is_forced(&self) -> bool {
        matches!(self, StopOutcome::Forced(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StopOutcome::Graceful(_) => "graceful",
            StopOutcome::Forced(_) => "forced",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerEventKind {
    Output {
        stream: OutputStream,
        signal: LineSignal,
        line: String,
    },
    Exited(WorkerExit),
}

/// Everything a worker reports to the supervisor loop, tagged with the
/// generation of the worker that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerEvent {
    pub generation: u64,
    pub kind: WorkerEventKind,
}

pub type WorkerEventSender = mpsc::UnboundedSender<WorkerEvent>;
pub type WorkerEventReceiver = mpsc::UnboundedReceiver<WorkerEvent>;
