//! Gateway error types and response handling

use axum::{
    body::Body,
    http::{header, Response, StatusCode},
    response::IntoResponse,
};
use std::time::Duration;

/// Errors surfaced by the gateway.
///
/// Every handler-level failure converts to a structured HTTP response at
/// the gateway boundary; nothing reaches the client as a bare connection
/// close. `BackendNotReady` is the startup-only exception: it aborts the
/// process before serving begins.
#[derive(Debug)]
pub enum GatewayError {
    /// Backend never answered its health check before the startup deadline
    BackendNotReady { waited: Duration },
    /// Upstream client used before initialization or after shutdown
    UpstreamUnavailable,
    /// Completion request body is not a JSON mapping
    MalformedRequest(String),
    /// Completion engine failed, on dispatch or mid-stream
    CompletionFailed(String),
    /// Transport-level failure calling the backend/upstream
    UpstreamRequestFailed(String),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            // Startup-only; mapped anyway so conversion is total
            GatewayError::BackendNotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::CompletionFailed(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamRequestFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            GatewayError::BackendNotReady { .. } => "backend_not_ready",
            GatewayError::UpstreamUnavailable => "upstream_unavailable",
            GatewayError::MalformedRequest(_) => "malformed_request",
            GatewayError::CompletionFailed(_) => "completion_failed",
            GatewayError::UpstreamRequestFailed(_) => "upstream_request_failed",
        }
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::BackendNotReady { waited } => write!(
                f,
                "backend failed to become ready within {:.1}s",
                waited.as_secs_f64()
            ),
            GatewayError::UpstreamUnavailable => {
                f.write_str("upstream client is not initialized")
            }
            GatewayError::MalformedRequest(msg) => write!(f, "invalid request body: {msg}"),
            GatewayError::CompletionFailed(msg) => write!(f, "completion failed: {msg}"),
            GatewayError::UpstreamRequestFailed(msg) => write!(f, "upstream request failed: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response<Body> {
        let status = self.status();
        let message = self.to_string();

        tracing::error!("Gateway error: {} - {}", status, message);

        let body = serde_json::json!({
            "error": {
                "type": self.kind(),
                "message": message,
            }
        });

        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|_| Response::new(Body::from("Internal error building error response")))
    }
}
