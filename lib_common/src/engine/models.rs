//! Response shapes of the engine management API, and the aggregated shapes the
//! control surface returns.

use serde::{Deserialize, Serialize};

/// `GET /proxies/{name}`. Groups and single nodes share this endpoint; only
/// groups carry `all`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub now: Option<String>,
    #[serde(default)]
    pub all: Option<Vec<String>>,
    #[serde(default)]
    pub alive: bool,
    #[serde(default)]
    pub history: Vec<DelayRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelayRecord {
    #[serde(default)]
    pub delay: u64,
}

impl ProxyEntry {
    /// Delay of the most recent health check, or 0 when never checked.
    pub fn last_delay(&self) -> u64 {
        self.history.last().map_or(0, |h| h.delay)
    }
}

/// A selector group: its members and the member currently in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyGroup {
    pub name: String,
    pub kind: String,
    pub now: String,
    pub all: Vec<String>,
}

impl ProxyGroup {
    pub fn contains(&self, node: &str) -> bool {
        self.all.iter().any(|n| n == node)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SwitchBody<'a> {
    pub name: &'a str,
}

/// One member of a group as reported by `GET /nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub alive: bool,
    pub latency_ms: u64,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeListing {
    pub group: String,
    pub current: String,
    pub total: usize,
    pub nodes: Vec<NodeInfo>,
}
