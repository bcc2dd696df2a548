use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use vigil_types::{VigilError, VigilResult};

use super::classifier::LineClassifier;
use super::types::*;
use crate::config::WorkerConfig;

/// Wait after a forced kill before giving up on collecting the exit status.
const FORCED_KILL_TIMEOUT: Duration = Duration::from_secs(5);
/// Output still buffered in the pipes when the worker exits is read for at
/// most this long before the exit is reported.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_LINE_LEN: usize = 4096;

/// Owns exactly one running worker process.
///
/// A reaper task owns the `Child`; the handle talks to it through a kill
/// channel and observes the exit through a watch channel. Dropping the
/// handle closes the kill channel, which the reaper treats as a forced
/// kill, so no worker outlives its handle.
pub struct WorkerHandle {
    generation: u64,
    pid: Option<u32>,
    kill_tx: Option<oneshot::Sender<()>>,
    exit_rx: watch::Receiver<Option<WorkerExit>>,
}

impl WorkerHandle {
    pub fn start(
        config: &WorkerConfig,
        classifier: Arc<dyn LineClassifier>,
        generation: u64,
        events: WorkerEventSender,
    ) -> VigilResult<Self> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            VigilError::Spawn(format!("Failed to launch '{}': {}", config.program, e))
        })?;

        let pid = child.id();
        let mut readers = Vec::with_capacity(2);

        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(
                stdout,
                OutputStream::Stdout,
                generation,
                classifier.clone(),
                events.clone(),
            ));
        }

        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(
                stderr,
                OutputStream::Stderr,
                generation,
                classifier,
                events.clone(),
            ));
        }

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(reap(child, generation, kill_rx, readers, exit_tx, events));

        info!(
            "Launched worker generation {} (pid {:?}): {}",
            generation,
            pid,
            config.command_line()
        );

        Ok(Self {
            generation,
            pid,
            kill_tx: Some(kill_tx),
            exit_rx,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        self.exit_rx.borrow().is_none()
    }

    pub fn exit_status(&self) -> Option<WorkerExit> {
        self.exit_rx.borrow().clone()
    }

    /// Waits up to `timeout` for the worker to exit.
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> Option<WorkerExit> {
        let waited = tokio::time::timeout(timeout, self.exit_rx.wait_for(Option::is_some))
            .await
            .map(|res| res.map(|exit| exit.clone()));

        match waited {
            Ok(Ok(exit)) => exit,
            Ok(Err(_)) => self.exit_status(),
            Err(_) => None,
        }
    }

    /// Graceful termination request, then a forced kill once `grace` expires.
    pub async fn stop(mut self, grace: Duration) -> StopOutcome {
        if let Some(exit) = self.exit_status() {
            debug!("Worker generation {} already exited ({})", self.generation, exit);
            return StopOutcome::Graceful(exit);
        }

        self.request_termination();

        if let Some(exit) = self.wait_for_exit(grace).await {
            info!("Worker generation {} stopped gracefully ({})", self.generation, exit);
            return StopOutcome::Graceful(exit);
        }

        warn!(
            "Worker generation {} (pid {:?}) did not exit within {:?}, forcing termination",
            self.generation, self.pid, grace
        );

        if let Some(kill_tx) = self.kill_tx.take() {
            let _ = kill_tx.send(());
        }

        let exit = match self.wait_for_exit(FORCED_KILL_TIMEOUT).await {
            Some(exit) => exit,
            None => {
                error!(
                    "Worker generation {} (pid {:?}) did not report an exit after a forced kill",
                    self.generation, self.pid
                );
                WorkerExit::unknown()
            }
        };

        StopOutcome::Forced(exit)
    }

    #[cfg(unix)]
    fn request_termination(&self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.pid {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                debug!("Failed to send SIGTERM to worker pid {}: {}", pid, e);
            }
        }
    }

    #[cfg(not(unix))]
    fn request_termination(&self) {
        debug!("No graceful termination signal on this platform; waiting out the grace period");
    }
}

async fn reap(
    mut child: Child,
    generation: u64,
    kill_rx: oneshot::Receiver<()>,
    readers: Vec<JoinHandle<()>>,
    exit_tx: watch::Sender<Option<WorkerExit>>,
    events: WorkerEventSender,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx => {
            if let Err(e) = child.start_kill() {
                debug!("Kill of worker generation {} failed: {}", generation, e);
            }
            child.wait().await
        }
    };

    let exit = match status {
        Ok(status) => WorkerExit::from_status(status),
        Err(e) => {
            warn!("Failed to collect exit status of worker generation {}: {}", generation, e);
            WorkerExit::unknown()
        }
    };

    // Lines written just before the exit must reach the supervisor first.
    let deadline = tokio::time::Instant::now() + OUTPUT_DRAIN_TIMEOUT;
    for reader in readers {
        if tokio::time::timeout_at(deadline, reader).await.is_err() {
            debug!(
                "Output of worker generation {} still open after exit, not waiting for it",
                generation
            );
            break;
        }
    }

    debug!("Worker generation {} exited ({})", generation, exit);
    let _ = exit_tx.send(Some(exit.clone()));
    let _ = events.send(WorkerEvent {
        generation,
        kind: WorkerEventKind::Exited(exit),
    });
}

fn spawn_reader<R>(
    stream: R,
    kind: OutputStream,
    generation: u64,
    classifier: Arc<dyn LineClassifier>,
    events: WorkerEventSender,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(256);

        loop {
            buf.clear();
            let cut = match read_line_bounded(&mut reader, &mut buf).await {
                Ok(None) => break,
                Ok(Some(cut)) => cut,
                Err(e) => {
                    warn!("Failed to read worker {} for generation {}: {}", kind, generation, e);
                    break;
                }
            };

            let (line, signal) = match decode(&buf, cut) {
                Some(text) => {
                    let text = text.trim_end_matches(|c: char| c == '\r' || c == '\n');
                    let line = if cut { format!("{}...", text) } else { text.to_string() };
                    (line, classifier.classify(text))
                }
                None => {
                    let lossy = String::from_utf8_lossy(&buf);
                    (format!("malformed output: {}", lossy.trim_end()), LineSignal::Anomaly)
                }
            };

            trace!("worker[{}] {}: {}", generation, kind, line);

            if !signal.is_recognized() {
                continue;
            }

            let event = WorkerEvent {
                generation,
                kind: WorkerEventKind::Output {
                    stream: kind,
                    signal,
                    line,
                },
            };
            if events.send(event).is_err() {
                break;
            }
        }
    })
}

/// Reads one line into `buf`, keeping at most `MAX_LINE_LEN` bytes and
/// discarding the rest up to the next newline.
///
/// Returns `None` at end of stream, otherwise whether the line was cut.
async fn read_line_bounded<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<bool>>
where
    R: AsyncBufRead + Unpin,
{
    let mut consumed = 0;
    let mut cut = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if consumed == 0 { None } else { Some(cut) });
        }

        let (used, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };

        let room = MAX_LINE_LEN.saturating_sub(buf.len());
        if used > room {
            cut = true;
        }
        buf.extend_from_slice(&available[..used.min(room)]);

        reader.consume(used);
        consumed += used;

        if complete {
            return Ok(Some(cut));
        }
    }
}

/// A cut line may end inside a multi-byte character; that tail is dropped
/// rather than treated as malformed.
fn decode(buf: &[u8], cut: bool) -> Option<&str> {
    match std::str::from_utf8(buf) {
        Ok(text) => Some(text),
        Err(e) if cut && e.error_len().is_none() => std::str::from_utf8(&buf[..e.valid_up_to()]).ok(),
        Err(_) => None,
    }
}
