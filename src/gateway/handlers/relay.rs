//! Transparent relay - the catch-all passthrough handler
//!
//! Forwards any request the completion dispatcher does not claim to the
//! backend verbatim: same method, same path and query string, body passed
//! through (an originally-empty body is forwarded as no body at all).
//! The upstream response is buffered in full before responding - this is
//! not a streaming relay, so every failure converts to a clean gateway
//! error before any bytes reach the client.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, Response};

use crate::config::HostHeaderPolicy;
use crate::gateway::error::GatewayError;
use crate::gateway::state::GatewayState;

/// Hop-by-hop headers: connection-scoped, never copied across the two
/// HTTP legs of the proxy.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "content-length",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
}

/// Any-method catch-all handler
pub async fn relay_handler(
    State(state): State<GatewayState>,
    request: Request,
) -> Result<Response<Body>, GatewayError> {
    // Fail fast before any forwarding work if the client isn't available
    let upstream = state.upstream.get()?;

    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let body = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| GatewayError::MalformedRequest(format!("failed to read body: {e}")))?;

    // Forward request headers minus the hop-by-hop set; Host follows the
    // configured policy since some backends validate it
    let mut headers = parts.headers;
    let hop_names: Vec<_> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name.as_str()))
        .cloned()
        .collect();
    for name in hop_names {
        headers.remove(name);
    }
    match state.host_header {
        HostHeaderPolicy::Rewrite => {
            headers.insert(header::HOST, state.backend_authority.clone());
        }
        HostHeaderPolicy::Strip => {
            headers.remove(header::HOST);
        }
    }

    let body = if body.is_empty() { None } else { Some(body) };
    let upstream_response = upstream
        .request(parts.method, &path_and_query, headers, body)
        .await?;

    // Copy status and body verbatim; response headers minus the filter set
    let status = upstream_response.status();
    let response_headers = upstream_response.headers().clone();
    let bytes = upstream_response
        .bytes()
        .await
        .map_err(|e| GatewayError::UpstreamRequestFailed(e.to_string()))?;

    let mut builder = Response::builder().status(status);
    for (name, value) in response_headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        builder = builder.header(name, value);
    }

    builder.body(Body::from(bytes)).map_err(|e| {
        GatewayError::UpstreamRequestFailed(format!("failed to assemble relay response: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CompletionEngine, EngineError, JsonBody, RequestPayload};
    use crate::gateway::upstream::{UpstreamClient, UpstreamHandle};
    use async_trait::async_trait;
    use axum::http::{HeaderValue, StatusCode};
    use axum::Router;
    use httpmock::prelude::*;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// The relay never touches the engine; this one panics if it does.
    struct NoEngine;

    #[async_trait]
    impl CompletionEngine for NoEngine {
        async fn complete(&self, _: RequestPayload) -> Result<Box<dyn JsonBody>, EngineError> {
            panic!("relay must not invoke the engine");
        }
        async fn stream(
            &self,
            _: RequestPayload,
        ) -> Result<crate::engine::ChunkStream, EngineError> {
            panic!("relay must not invoke the engine");
        }
    }

    fn app_with(
        upstream: Arc<UpstreamHandle>,
        host_header: HostHeaderPolicy,
        authority: &str,
    ) -> Router {
        let state = GatewayState {
            upstream,
            engine: Arc::new(NoEngine),
            backend_authority: HeaderValue::from_str(authority).unwrap(),
            host_header,
        };
        Router::new().fallback(relay_handler).with_state(state)
    }

    fn ready_handle(base_url: &str) -> Arc<UpstreamHandle> {
        let handle = Arc::new(UpstreamHandle::new());
        handle.install(UpstreamClient::new(base_url, None).unwrap());
        handle
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_relay_forwards_verbatim_and_filters_hop_by_hop() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/models");
                then.status(200)
                    .header("content-type", "application/json")
                    .header("x-request-id", "req-42")
                    .header("connection", "keep-alive")
                    .body(r#"{"data":[]}"#);
            })
            .await;

        let app = app_with(
            ready_handle(&server.base_url()),
            HostHeaderPolicy::Strip,
            "127.0.0.1:10001",
        );

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("GET")
                    .uri("/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
        // Non-filtered headers survive with values unchanged
        assert_eq!(response.headers()["x-request-id"], "req-42");
        assert_eq!(response.headers()["content-type"], "application/json");
        // Hop-by-hop headers never cross the proxy
        assert!(response.headers().get("connection").is_none());
        assert_eq!(body_string(response).await, r#"{"data":[]}"#);
    }

    #[tokio::test]
    async fn test_relay_preserves_method_path_query_and_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/admin/keys")
                    .query_param("rotate", "true")
                    .body(r#"{"key":"k1"}"#);
                then.status(201).body("created");
            })
            .await;

        let app = app_with(
            ready_handle(&server.base_url()),
            HostHeaderPolicy::Strip,
            "127.0.0.1:10001",
        );

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("PUT")
                    .uri("/admin/keys?rotate=true")
                    .body(Body::from(r#"{"key":"k1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_string(response).await, "created");
    }

    #[tokio::test]
    async fn test_relay_rewrites_host_when_configured() {
        let server = MockServer::start_async().await;
        let authority = format!("127.0.0.1:{}", server.port());
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/ping").header("host", authority.as_str());
                then.status(200);
            })
            .await;

        let app = app_with(
            ready_handle(&server.base_url()),
            HostHeaderPolicy::Rewrite,
            &authority,
        );

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("GET")
                    .uri("/ping")
                    .header("host", "public.gateway.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_uninitialized_upstream_is_503_without_network() {
        // Handle never installed: the request must fail fast
        let app = app_with(
            Arc::new(UpstreamHandle::new()),
            HostHeaderPolicy::Rewrite,
            "127.0.0.1:10001",
        );

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("GET")
                    .uri("/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_502() {
        // Nothing listens here; the transport failure maps to 502
        let app = app_with(
            ready_handle("http://127.0.0.1:1"),
            HostHeaderPolicy::Strip,
            "127.0.0.1:1",
        );

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("GET")
                    .uri("/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_filter_set_matches_case_insensitively() {
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(is_hop_by_hop("CONNECTION"));
        assert!(is_hop_by_hop("keep-alive"));
        assert!(!is_hop_by_hop("x-request-id"));
        assert!(!is_hop_by_hop("content-type"));
    }
}
