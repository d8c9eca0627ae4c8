//! # Status Store
//!
//! The one piece of shared mutable state in the update path. `UpdateState`
//! lives inside a `tokio::sync::watch` cell:
//!
//! - the single-flight check-and-set is one `send_if_modified` call, so two
//!   concurrent triggers can never both see `running == false`;
//! - completion writes `running`, `lastRunAt`, `runCount` and `lastResult` in
//!   one `send_modify` call, so readers never observe a half-recorded run;
//! - readers clone a snapshot out of the cell and never hold a reference into
//!   live state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The process exited on its own. `code` is `None` when it was killed by a signal.
    Exited { code: Option<i32> },
    /// The hard deadline fired and the process was killed.
    #[serde(rename_all = "camelCase")]
    TimedOut { timeout_ms: u64 },
    /// The process could not be started or waited on.
    Error { message: String },
}

/// The recorded result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub success: bool,
    #[serde(rename = "exitInfo")]
    pub outcome: RunOutcome,
    pub stdout_tail: String,
    pub stderr_tail: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn new(
        outcome: RunOutcome,
        stdout_tail: String,
        stderr_tail: String,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let success = matches!(outcome, RunOutcome::Exited { code: Some(0) });
        Self {
            success,
            outcome,
            stdout_tail,
            stderr_tail,
            started_at,
            duration_ms,
        }
    }

    /// A failure with no captured output.
    pub fn error(message: impl Into<String>, started_at: DateTime<Utc>, duration_ms: u64) -> Self {
        Self::new(
            RunOutcome::Error {
                message: message.into(),
            },
            String::new(),
            String::new(),
            started_at,
            duration_ms,
        )
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.outcome, RunOutcome::TimedOut { .. })
    }
}

/// Snapshot of the orchestrator as seen by pollers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateState {
    pub running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_result: Option<RunResult>,
    pub run_count: u64,
}

/// Owner of the `UpdateState` cell.
#[derive(Debug)]
pub struct StatusStore {
    tx: watch::Sender<UpdateState>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(UpdateState::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> UpdateState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.tx.subscribe()
    }

    /// Idle → Running. Returns `false`, leaving the state untouched, if a run
    /// is already in progress.
    pub(crate) fn try_begin(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.running {
                false
            } else {
                state.running = true;
                true
            }
        })
    }

    /// Running → Idle, recording the run.
    pub(crate) fn complete(&self, result: RunResult, finished_at: DateTime<Utc>) {
        self.tx.send_modify(|state| {
            state.running = false;
            state.last_run_at = Some(finished_at);
            state.run_count += 1;
            state.last_result = Some(result);
        });
    }
}
