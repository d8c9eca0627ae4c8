//! Shared building blocks for the node selection tools.
//!
//! Each module sits behind a cargo feature of the same name; `full` (the
//! default) enables all of them.

/// Concurrent TCP probing, ranking and candidate loading.
#[cfg(feature = "probe")]
pub mod probe;

/// Single-flight execution of the refresh pipeline.
#[cfg(feature = "orchestrator")]
pub mod orchestrator;

/// Client for the proxy engine management API.
#[cfg(feature = "engine")]
pub mod engine;

/// `tracing` subscriber setup and log file rotation.
#[cfg(feature = "loggers")]
pub mod loggers;
