//! # Engine Management Client
//!
//! Typed access to the running proxy engine's RESTful management API:
//! inspecting selector groups, switching the active node of a group, listing
//! group members with their last health-check delay, and reading the engine
//! version for liveness checks.
//!
//! Every failure is an [`EngineError`], and the variants keep "the engine is
//! down" apart from "the group or node does not exist" so the control surface
//! can answer with the right status code.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// HTTP transport with retry middleware.
pub mod api;
/// Engine response shapes and aggregated listings.
pub mod models;

use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use reqwest::Method;
use thiserror::Error;
use tracing::{debug, info};

pub use api::{ApiClient, ApiResponse};
pub use models::{NodeInfo, NodeListing, ProxyEntry, ProxyGroup, VersionInfo};
use models::SwitchBody;

/// How many names of a group are quoted in a "not a member" error.
const AVAILABLE_PREVIEW: usize = 20;
/// Node detail requests in flight while building a listing.
const LISTING_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine API at {base_url} is unreachable: {reason}")]
    Unreachable { base_url: String, reason: String },

    #[error("proxy group '{group}' does not exist")]
    GroupNotFound { group: String },

    #[error("node '{node}' is not in proxy group '{group}', available: {}", preview(.available))]
    NodeNotInGroup {
        node: String,
        group: String,
        available: Vec<String>,
    },

    #[error("engine rejected the switch: HTTP {status} - {body}")]
    SwitchRejected { status: u16, body: String },

    #[error("engine answered {endpoint} with HTTP {status} - {body}")]
    UnexpectedStatus { endpoint: String, status: u16, body: String },

    #[error("engine returned an invalid response for {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("invalid engine base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("engine request failed: {0}")]
    Transport(String),
}

fn preview(names: &[String]) -> String {
    let shown: Vec<&str> = names.iter().take(AVAILABLE_PREVIEW).map(String::as_str).collect();
    if names.len() > AVAILABLE_PREVIEW {
        format!("[{}, ...]", shown.join(", "))
    } else {
        format!("[{}]", shown.join(", "))
    }
}

/// Connection settings for the engine API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub base_url: String,
    pub secret: Option<String>,
    pub request_timeout: Duration,
    pub health_timeout: Duration,
    pub retries: u32,
}

impl EngineConfig {
    pub const DEFAULT_BASE_URL: &'static str = "http://127.0.0.1:9090";

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            secret: None,
            request_timeout: Duration::from_secs(10),
            health_timeout: Duration::from_secs(5),
            retries: 1,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_URL)
    }
}

pub struct EngineClient {
    api: ApiClient,
    health_timeout: Duration,
}

impl EngineClient {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            api: ApiClient::new(config)?,
            health_timeout: config.health_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url().as_str()
    }

    /// Fetches a proxy or group entry; `None` when the engine answers non-2xx.
    pub async fn proxy(&self, name: &str) -> Result<Option<ProxyEntry>, EngineError> {
        let response = self
            .api
            .request::<ProxyEntry, ()>(Method::GET, &["proxies", name], None, None)
            .await?;
        if !response.success {
            debug!(name, status = response.status, "proxy entry not available");
            return Ok(None);
        }
        response.data.map(Some).ok_or_else(|| EngineError::InvalidResponse {
            endpoint: format!("/proxies/{name}"),
            reason: "empty body".to_string(),
        })
    }

    /// Looks up a selector group.
    pub async fn group(&self, group: &str) -> Result<ProxyGroup, EngineError> {
        let not_found = || EngineError::GroupNotFound {
            group: group.to_string(),
        };
        let entry = self.proxy(group).await?.ok_or_else(not_found)?;
        let all = entry.all.ok_or_else(not_found)?;
        Ok(ProxyGroup {
            name: entry.name,
            kind: entry.kind,
            now: entry.now.unwrap_or_default(),
            all,
        })
    }

    /// Makes `node` the active member of `group`.
    pub async fn switch(&self, group: &str, node: &str) -> Result<(), EngineError> {
        let current = self.group(group).await?;
        if !current.contains(node) {
            return Err(EngineError::NodeNotInGroup {
                node: node.to_string(),
                group: group.to_string(),
                available: current.all,
            });
        }

        let response = self
            .api
            .request::<serde_json::Value, _>(Method::PUT, &["proxies", group], Some(&SwitchBody { name: node }), None)
            .await?;
        if response.status != 204 {
            return Err(EngineError::SwitchRejected {
                status: response.status,
                body: response.error_body.unwrap_or_default(),
            });
        }

        info!(group, node, previous = %current.now, "switched active node");
        Ok(())
    }

    /// Lists the members of `group` with their latest health-check result.
    /// Members whose details the engine does not return are skipped.
    pub async fn list_nodes(&self, group: &str) -> Result<NodeListing, EngineError> {
        let current = self.group(group).await?;
        let now = current.now.clone();

        let details: Vec<Result<Option<ProxyEntry>, EngineError>> = stream::iter(current.all.iter().map(|name| self.proxy(name)).collect::<Vec<_>>())
            .buffered(LISTING_CONCURRENCY)
            .collect()
            .await;

        let mut nodes = Vec::with_capacity(details.len());
        for (requested, detail) in current.all.iter().zip(details) {
            let Some(entry) = detail? else { continue };
            let latency_ms = entry.last_delay();
            nodes.push(NodeInfo {
                current: *requested == now,
                name: entry.name,
                kind: entry.kind,
                alive: entry.alive,
                latency_ms,
            });
        }

        Ok(NodeListing {
            group: group.to_string(),
            current: now,
            total: nodes.len(),
            nodes,
        })
    }

    /// Reads the engine version; the cheapest liveness probe the API offers.
    pub async fn version(&self) -> Result<String, EngineError> {
        let response = self
            .api
            .request::<VersionInfo, ()>(Method::GET, &["version"], None, Some(self.health_timeout))
            .await?;
        if !response.success {
            return Err(EngineError::UnexpectedStatus {
                endpoint: "/version".to_string(),
                status: response.status,
                body: response.error_body.unwrap_or_default(),
            });
        }
        response
            .data
            .map(|v| v.version)
            .ok_or_else(|| EngineError::InvalidResponse {
                endpoint: "/version".to_string(),
                reason: "empty body".to_string(),
            })
    }
}
