//! # Update Orchestrator
//!
//! Runs the external refresh pipeline in the background, at most one run at a
//! time, and publishes its progress through the [`StatusStore`].
//!
//! ## Lifecycle
//!
//! `Idle → Running → Idle`. [`UpdateOrchestrator::trigger`] either claims the
//! Running state and spawns a task, or reports `Busy` without touching
//! anything. The spawned task owns a `CompletionGuard`; whichever way the task
//! ends (normal result, panic, runtime shutdown) the guard performs the
//! Running → Idle bookkeeping exactly once.
//!
//! Callers never wait for the pipeline. They learn the outcome by reading
//! [`UpdateOrchestrator::status`] or by awaiting changes on
//! [`UpdateOrchestrator::subscribe`].

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// External pipeline execution with timeout and tail capture.
pub mod pipeline;
/// The shared `UpdateState` cell.
pub mod status;
/// Bounded output tail buffer.
pub mod tail;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};

pub use pipeline::{PipelineConfig, SKIP_SIDE_EFFECTS_FLAG};
pub use status::{RunOutcome, RunResult, StatusStore, UpdateState};

/// Answer to a trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOutcome {
    /// A new run was started; poll the status to observe it.
    Accepted,
    /// A run is already in progress; nothing changed.
    Busy,
}

pub struct UpdateOrchestrator {
    store: Arc<StatusStore>,
    pipeline: Arc<PipelineConfig>,
}

impl UpdateOrchestrator {
    pub fn new(pipeline: PipelineConfig) -> Self {
        Self {
            store: Arc::new(StatusStore::new()),
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Starts a run unless one is already in progress. Never waits for the
    /// pipeline. Must be called from within a Tokio runtime.
    pub fn trigger(&self) -> TriggerOutcome {
        if !self.store.try_begin() {
            info!("update requested while a run is in progress");
            return TriggerOutcome::Busy;
        }

        let guard = CompletionGuard::new(Arc::clone(&self.store));
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            let result = pipeline::execute(&pipeline).await;
            guard.finish(result);
        });

        info!(program = %self.pipeline.program.display(), "update accepted");
        TriggerOutcome::Accepted
    }

    pub fn status(&self) -> UpdateState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.store.subscribe()
    }
}

/// Performs the Running → Idle transition for exactly one run.
struct CompletionGuard {
    store: Arc<StatusStore>,
    started_at: chrono::DateTime<Utc>,
    clock: Instant,
    recorded: bool,
}

impl CompletionGuard {
    fn new(store: Arc<StatusStore>) -> Self {
        Self {
            store,
            started_at: Utc::now(),
            clock: Instant::now(),
            recorded: false,
        }
    }

    fn finish(mut self, result: RunResult) {
        self.store.complete(result, Utc::now());
        self.recorded = true;
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.recorded {
            return;
        }
        error!("pipeline task ended without recording a result");
        let result = RunResult::error(
            "pipeline task aborted before completion",
            self.started_at,
            self.clock.elapsed().as_millis() as u64,
        );
        self.store.complete(result, Utc::now());
    }
}
