//! Upstream client - the shared HTTP client bound to the backend base URL
//!
//! One client exists per process lifetime. It is connection-pooled and has
//! no default request timeout: long-running completions must not be
//! truncated. Handlers reach it through `UpstreamHandle`, which makes the
//! uninitialized -> ready -> closed lifecycle explicit instead of
//! scattering nullable checks per call site.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;

use super::error::GatewayError;

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Pooled HTTP client bound to the backend/upstream base URL.
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Build the client. `request_timeout` is None by default so streaming
    /// responses are never cut; health checks pass their own per-attempt
    /// timeout instead.
    pub fn new(base_url: impl Into<String>, request_timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            // Force HTTP/1.1 to avoid HTTP/2 connection reset issues with some providers
            .http1_only();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .context("Failed to create upstream HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a request for `path_and_query` (leading slash included)
    /// against the base URL. Transport failures map to
    /// `UpstreamRequestFailed`.
    pub async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}{}", self.base_url, path_and_query);

        let mut builder = self.client.request(method, &url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        builder
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamRequestFailed(e.to_string()))
    }

    /// One readiness probe against `GET /health`, bounded by its own
    /// timeout so a black-holed attempt cannot eat the startup deadline.
    pub async fn health_check(&self, attempt_timeout: Duration) -> reqwest::Result<reqwest::StatusCode> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(attempt_timeout)
            .send()
            .await?;
        Ok(response.status())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Single-assignment slot for the process-wide upstream client.
///
/// Request tasks only ever observe one of three states: empty (before
/// startup completes), ready, or closed (after shutdown begins). The first
/// and last both fail fast with `UpstreamUnavailable`.
pub struct UpstreamHandle {
    slot: OnceLock<UpstreamClient>,
    closed: AtomicBool,
}

impl UpstreamHandle {
    pub fn new() -> Self {
        Self {
            slot: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Install the client, transitioning the handle to ready. Called once
    /// at startup, after the readiness gate has passed.
    pub fn install(&self, client: UpstreamClient) {
        if self.slot.set(client).is_err() {
            // Start/stop are not designed for re-entry; keep the first client
            tracing::warn!("Upstream client installed twice; keeping the first");
        }
    }

    /// Borrow the client, or fail fast outside the ready window.
    pub fn get(&self) -> Result<&UpstreamClient, GatewayError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::UpstreamUnavailable);
        }
        self.slot.get().ok_or(GatewayError::UpstreamUnavailable)
    }

    /// Begin shutdown: all subsequent `get` calls fail. The pooled
    /// connections close when the last in-flight request drops.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl Default for UpstreamHandle {
    fn default() -> Self {
        Self::new()
    }
}
