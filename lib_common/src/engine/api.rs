//! # Engine HTTP Transport
//!
//! A thin wrapper around `reqwest` and `reqwest-middleware` for the engine's
//! management API. It owns the base URL, the optional bearer secret and the
//! retry policy, and hands back an [`ApiResponse`] for any HTTP status: only
//! transport failures and undecodable bodies are errors here, the meaning of a
//! status code is left to the caller.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{EngineConfig, EngineError};

/// A decoded response plus the metadata callers branch on.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The deserialized body of a successful response; `None` for empty bodies.
    pub data: Option<T>,
    /// The raw body of a non-2xx response.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Whether the status was in the 2xx range.
    pub success: bool,
}

pub struct ApiClient {
    inner: ClientWithMiddleware,
    base_url: Url,
    auth_token: Option<String>,
}

impl ApiClient {
    /// Builds a client for `config.base_url`.
    ///
    /// # Errors
    /// Fails when the base URL is not an absolute `http(s)` URL or the
    /// underlying client cannot be built.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(EngineError::InvalidBaseUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.retries);
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        let inner = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner,
            base_url,
            auth_token: config.secret.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Performs one request and decodes a JSON body into `T` on success.
    pub async fn request<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        timeout: Option<Duration>,
    ) -> Result<ApiResponse<T>, EngineError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments);
        let endpoint = url.path().to_string();
        debug!(%method, %url, "engine request");

        let mut req = self.inner.request(method, url);
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(b) = body {
            let json_body = serde_json::to_string(b).map_err(|e| EngineError::Transport(e.to_string()))?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }
        if let Some(t) = timeout {
            req = req.timeout(t);
        }

        let response = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(reqwest_middleware::Error::Reqwest(e)))?;

        if status.is_success() {
            let data = if text.trim().is_empty() {
                None
            } else {
                let parsed = serde_json::from_str::<T>(&text).map_err(|e| EngineError::InvalidResponse {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                })?;
                Some(parsed)
            };
            Ok(ApiResponse {
                data,
                error_body: None,
                status: status.as_u16(),
                success: true,
            })
        } else {
            Ok(ApiResponse {
                data: None,
                error_body: Some(text),
                status: status.as_u16(),
                success: false,
            })
        }
    }

    fn transport_error(&self, err: reqwest_middleware::Error) -> EngineError {
        match err {
            reqwest_middleware::Error::Reqwest(e) if e.is_connect() || e.is_timeout() => EngineError::Unreachable {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            },
            other => EngineError::Transport(other.to_string()),
        }
    }
}
