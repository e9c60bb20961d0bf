//! Remote content gateway
//!
//! Thin HTTP client abstraction over the translate API. Requests carry a
//! correlation id and optional bearer token; transient failures on these
//! idempotent reads get a bounded retry with doubling backoff before the
//! error surfaces to the resolution engine.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::error::{ContentError, Result};
use crate::payload::unwrap_payload;

/// Async seam between the engine/poller and the network.
///
/// Production uses [`RemoteGateway`]; tests substitute scripted fetchers.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch and unwrap the content payload at `url`.
    async fn fetch(&self, url: &str) -> Result<Value>;
}

/// HTTP gateway to the remote content API.
pub struct RemoteGateway {
    client: reqwest::Client,
    base_url: String,
    config: CoreConfig,
}

impl RemoteGateway {
    /// Build a gateway for the given API origin (e.g. `https://api.example.org`).
    pub fn new(base_url: &str, config: &CoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.gateway_timeout)
            .build()
            .map_err(|e| ContentError::Transient(format!("client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        })
    }

    fn full_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Value> {
        let correlation_id = Uuid::new_v4();
        let mut request = self
            .client
            .get(url)
            .header("x-correlation-id", correlation_id.to_string());

        if let Some(ref token) = self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ContentError::Transient(format!("timeout fetching {url}"))
            } else {
                ContentError::Transient(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Response {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ContentError::Transient(format!("body read failed: {e}")))?;

        unwrap_payload(&body)
    }
}

#[async_trait]
impl ContentFetcher for RemoteGateway {
    async fn fetch(&self, url: &str) -> Result<Value> {
        let url = self.full_url(url);
        let mut attempt = 0u32;

        loop {
            match self.fetch_once(&url).await {
                Ok(payload) => {
                    debug!(url = %url, attempt = attempt, "Remote fetch succeeded");
                    return Ok(payload);
                }
                Err(e) if e.is_transient() && attempt < self.config.gateway_max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_delay(attempt);
                    warn!(
                        url = %url,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(url = %url, attempt = attempt, error = %e, "Remote fetch failed");
                    return Err(e);
                }
            }
        }
    }
}
