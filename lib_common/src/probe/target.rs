//! # Probe Data Model
//!
//! The immutable values that flow through a probing round: the `ProbeTarget`
//! supplied by the caller, the `ProbeResult` produced once per target, and the
//! `ProbeFailure` classification attached to every unreachable result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named network endpoint to test for reachability and latency.
///
/// The port is kept as the raw integer found in the candidate list, so that
/// zero, negative or out-of-range values reach the prober and are recorded as
/// unreachable instead of being rejected while loading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeTarget {
    /// Unique name of the candidate within one round.
    pub name: String,
    /// Hostname or IP address to connect to.
    pub host: String,
    /// TCP port, valid only in `1..=65535`.
    pub port: i64,
}

impl ProbeTarget {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: i64) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// Returns the port as a socket port, or `None` when the target cannot be
    /// probed at all (empty host, port outside `1..=65535`).
    pub fn socket_port(&self) -> Option<u16> {
        if self.host.trim().is_empty() {
            return None;
        }
        u16::try_from(self.port).ok().filter(|port| *port > 0)
    }

    /// `host:port` as shown in reports.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Why a target was recorded as unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeFailure {
    /// Missing host or unusable port; no connection was attempted.
    InvalidTarget,
    /// The connection did not complete within the per-probe timeout.
    Timeout,
    /// The remote end actively refused the connection.
    Refused,
    /// Any other socket or resolver error.
    Io(String),
}

/// # Probe Result
///
/// The outcome of probing one target in one round. Built once through
/// [`ProbeResult::reachable`] or [`ProbeResult::unreachable`] and never
/// mutated afterwards, which keeps `latency_ms` present exactly when
/// `reachable` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    /// The probed target.
    pub target: ProbeTarget,
    /// Position of the target in the input list; the ranker's tie-break.
    pub index: usize,
    /// Whether the TCP handshake completed in time.
    pub reachable: bool,
    /// Connect latency in milliseconds, only for reachable targets.
    pub latency_ms: Option<u64>,
    /// When the probe finished.
    pub measured_at: DateTime<Utc>,
    /// Failure classification, only for unreachable targets.
    pub failure: Option<ProbeFailure>,
}

impl ProbeResult {
    pub fn reachable(index: usize, target: ProbeTarget, latency_ms: u64) -> Self {
        Self {
            target,
            index,
            reachable: true,
            latency_ms: Some(latency_ms),
            measured_at: Utc::now(),
            failure: None,
        }
    }

    pub fn unreachable(index: usize, target: ProbeTarget, failure: ProbeFailure) -> Self {
        Self {
            target,
            index,
            reachable: false,
            latency_ms: None,
            measured_at: Utc::now(),
            failure: Some(failure),
        }
    }
}

/// Knobs for one probing round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Upper bound for a single connection attempt.
    pub timeout: std::time::Duration,
    /// Maximum number of probes in flight. Zero behaves as one.
    pub concurrency: usize,
}

impl ProbeOptions {
    pub const DEFAULT_TIMEOUT_MS: u64 = 3000;
    pub const DEFAULT_CONCURRENCY: usize = 50;
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: std::time::Duration::from_millis(Self::DEFAULT_TIMEOUT_MS),
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }
}

/// Round-level failures. Per-target problems never surface here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("none of the {probed} probed targets is reachable")]
    NoReachableTargets { probed: usize },
}
