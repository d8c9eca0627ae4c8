//! # Pipeline Runner
//!
//! Executes the external refresh pipeline (download candidates, probe, write
//! the engine configuration, reload the engine) as a child process with a hard
//! wall-clock deadline.
//!
//! stdout and stderr are drained concurrently into bounded `TailBuffer`s so
//! that a chatty pipeline can neither block on a full pipe nor grow memory.
//! On unix the child leads its own process group. When the deadline fires the
//! whole group is killed, so helpers started by the pipeline stop together
//! with it, and whatever output was captured up to that point is kept.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use super::status::{RunOutcome, RunResult};
use super::tail::TailBuffer;

/// Argument telling the pipeline to skip interactive or system-level side
/// effects (such as changing the host's proxy settings).
pub const SKIP_SIDE_EFFECTS_FLAG: &str = "--skip-proxy";

/// How long to keep draining pipes after the child is gone. Background
/// processes started by the pipeline may inherit the pipes and keep them open.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Everything needed to start one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
    pub tail_chars: usize,
}

impl PipelineConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 180;
    pub const DEFAULT_TAIL_CHARS: usize = 3000;

    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            tail_chars: Self::DEFAULT_TAIL_CHARS,
        }
    }

    /// `<interpreter> <script> --skip-proxy`, the invocation used by the
    /// control surface.
    pub fn script(interpreter: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        let script: PathBuf = script.into();
        Self::new(
            interpreter,
            vec![
                script.to_string_lossy().into_owned(),
                SKIP_SIDE_EFFECTS_FLAG.to_string(),
            ],
        )
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tail_chars(mut self, tail_chars: usize) -> Self {
        self.tail_chars = tail_chars;
        self
    }
}

struct Capture {
    buffer: Arc<Mutex<TailBuffer>>,
    task: Option<JoinHandle<()>>,
}

impl Capture {
    fn spawn<R>(reader: Option<R>, tail_chars: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(TailBuffer::new(tail_chars)));
        let task = reader.map(|mut reader| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) => break,
                        Err(e) => {
                            warn!(error = %e, "failed to read pipeline output");
                            break;
                        }
                        Ok(n) => buffer
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(&chunk[..n]),
                    }
                }
            })
        });
        Self { buffer, task }
    }

    async fn finish(self) -> String {
        if let Some(mut task) = self.task {
            if timeout(DRAIN_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .render()
    }
}

/// The process group led by a spawned pipeline. Killed on drop unless
/// released, which covers runs whose task is aborted mid-flight.
struct ProcessGroup {
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    fn kill(&mut self) {
        if let Some(pid) = self.leader.take() {
            kill_group(pid);
        }
    }

    /// The leader exited on its own; leave any survivors alone.
    fn release(&mut self) {
        self.leader = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = raw, error = %e, "failed to kill pipeline process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

/// Runs the pipeline once and always returns a `RunResult`; failures are
/// recorded, never propagated.
pub async fn execute(config: &PipelineConfig) -> RunResult {
    let started_at = Utc::now();
    let clock = Instant::now();

    let mut command = Command::new(&config.program);
    command
        .args(&config.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &config.working_dir {
        command.current_dir(dir);
    }
    #[cfg(unix)]
    command.process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(program = %config.program.display(), error = %e, "failed to start pipeline");
            return RunResult::error(
                format!("failed to start {}: {e}", config.program.display()),
                started_at,
                clock.elapsed().as_millis() as u64,
            );
        }
    };
    info!(pid = child.id(), program = %config.program.display(), "pipeline started");
    let mut group = ProcessGroup::new(child.id());

    let stdout = Capture::spawn(child.stdout.take(), config.tail_chars);
    let stderr = Capture::spawn(child.stderr.take(), config.tail_chars);

    let timeout_ms = config.timeout.as_millis() as u64;
    let outcome = match timeout(config.timeout, child.wait()).await {
        Ok(Ok(status)) => {
            group.release();
            RunOutcome::Exited { code: status.code() }
        }
        Ok(Err(e)) => {
            group.kill();
            RunOutcome::Error {
                message: format!("failed to wait for pipeline: {e}"),
            }
        }
        Err(_) => {
            warn!(timeout_ms, "pipeline timed out, killing its process group");
            group.kill();
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill timed-out pipeline");
            }
            RunOutcome::TimedOut { timeout_ms }
        }
    };

    let stdout_tail = stdout.finish().await;
    let stderr_tail = stderr.finish().await;
    let duration_ms = clock.elapsed().as_millis() as u64;

    let result = RunResult::new(outcome, stdout_tail, stderr_tail, started_at, duration_ms);
    info!(success = result.success, outcome = ?result.outcome, duration_ms, "pipeline finished");
    result
}
