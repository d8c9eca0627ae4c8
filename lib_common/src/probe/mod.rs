//! # Latency Probing & Ranking
//!
//! Finds the fastest reachable endpoint out of a list of candidates.
//!
//! ## Contained Modules:
//!
//! - **`target`**: the data model (`ProbeTarget`, `ProbeResult`, `ProbeFailure`,
//!   `ProbeOptions`) and the round-level `ProbeError`.
//! - **`prober`**: bounded-concurrency TCP connect probes, one per target.
//! - **`ranker`**: deterministic ordering of a round's results and selection of
//!   the best reachable entry.
//! - **`candidates`**: reads candidate targets out of a YAML subscription document.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Probe data model and round-level errors.
pub mod target;
/// Concurrent TCP connect probes.
pub mod prober;
/// Deterministic ranking and best-target selection.
pub mod ranker;
/// YAML candidate-list loader.
pub mod candidates;

// --- Public API Re-exports ---
pub use candidates::{load_targets, parse_targets, CandidateError};
pub use prober::{probe_all, probe_one};
pub use ranker::{rank, run_round, select_best, RankedList, Selection};
pub use target::{ProbeError, ProbeFailure, ProbeOptions, ProbeResult, ProbeTarget};
