//! Completion dispatcher
//!
//! Implements the specialized `/chat/completions` contract. The body is
//! parsed once, the `stream` flag is decided once, and everything else in
//! the payload passes to the completion engine opaquely. A Bearer
//! credential fills in `api_key` only when the body does not set one.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, Response, StatusCode};
use futures::StreamExt;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::engine::ChunkStream;
use crate::gateway::error::GatewayError;
use crate::gateway::sse;
use crate::gateway::state::GatewayState;

/// POST /chat/completions and /v1/chat/completions
pub async fn completions_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response<Body>, GatewayError> {
    // The body must be a JSON mapping; the engine is never invoked otherwise
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::MalformedRequest(e.to_string()))?;
    let Value::Object(mut payload) = value else {
        return Err(GatewayError::MalformedRequest(
            "expected a JSON object".to_string(),
        ));
    };

    // A Bearer credential is only a fallback; an explicit body value wins
    if !payload.contains_key("api_key") {
        if let Some(token) = bearer_token(&headers) {
            tracing::debug!(
                credential = %hash_credential(&token),
                "Using Authorization bearer as api_key"
            );
            payload.insert("api_key".to_string(), Value::String(token));
        }
    }

    // The stream flag is removed and decided exactly once. Only a JSON
    // boolean true selects streaming.
    let streaming = payload
        .remove("stream")
        .map(|v| v == Value::Bool(true))
        .unwrap_or(false);

    if streaming {
        payload.insert("stream".to_string(), Value::Bool(true));
        let chunks = state
            .engine
            .stream(payload)
            .await
            .map_err(|e| GatewayError::CompletionFailed(e.message().to_string()))?;
        Ok(stream_response(chunks))
    } else {
        let result = state
            .engine
            .complete(payload)
            .await
            .map_err(|e| GatewayError::CompletionFailed(e.message().to_string()))?;
        Ok(json_response(result.to_json()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response construction
// ─────────────────────────────────────────────────────────────────────────────

fn json_response(value: Value) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap_or_else(|_| Response::new(Body::from("Internal error building response")))
}

/// Build the SSE response for a streaming completion.
///
/// The frame stream is pull-based: the engine's chunk sequence is only
/// drained as fast as the client consumes frames, and dropping the body
/// (client disconnect) drops the sequence, aborting any in-flight upstream
/// work. A clean end emits exactly one `[DONE]`; a mid-stream engine
/// failure emits one terminal error frame instead, since the 200 status is
/// already on the wire.
fn stream_response(chunks: ChunkStream) -> Response<Body> {
    enum FrameState {
        Streaming(ChunkStream),
        Finished,
    }

    let frames = futures::stream::unfold(FrameState::Streaming(chunks), |state| async move {
        match state {
            FrameState::Streaming(mut chunks) => match chunks.next().await {
                Some(Ok(chunk)) => {
                    let frame = sse::data_frame(&chunk.to_json());
                    Some((
                        Ok::<_, std::convert::Infallible>(frame),
                        FrameState::Streaming(chunks),
                    ))
                }
                Some(Err(e)) => {
                    tracing::error!("Completion stream failed mid-flight: {e}");
                    Some((Ok(sse::error_frame(e.message())), FrameState::Finished))
                }
                None => Some((Ok(sse::DONE_FRAME.to_string()), FrameState::Finished)),
            },
            FrameState::Finished => None,
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(frames))
        .unwrap_or_else(|_| Response::new(Body::from("Internal error building response")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Header helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extract the token from `Authorization: Bearer <token>` (scheme is
/// case-insensitive).
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = auth.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Short SHA-256 digest for logging - never log the credential itself
fn hash_credential(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let hash = hasher.finalize();
    format!("{:x}", hash)[..16].to_string()
}
