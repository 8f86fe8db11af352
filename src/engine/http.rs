//! HTTP completion engine
//!
//! The default engine: issues OpenAI-compatible chat-completion calls
//! against the backend (or an external upstream) and adapts the responses
//! to the dispatcher's `JsonBody` contract. Streaming responses arrive as
//! SSE and are decoded incrementally into one chunk per `data:` frame.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::sse;

use super::{ChunkStream, CompletionEngine, EngineError, JsonBody, RawJson, RequestPayload};

/// How much upstream error body to carry into an engine error message
const ERROR_BODY_LIMIT: usize = 2048;

// ─────────────────────────────────────────────────────────────────────────────
// Typed payloads (structured dump)
// ─────────────────────────────────────────────────────────────────────────────

/// An OpenAI-shaped chat completion result.
///
/// Unknown provider-specific fields ride along in `extra` so the
/// structured dump loses nothing.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl JsonBody for ChatCompletion {
    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One OpenAI-shaped streaming chunk.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl JsonBody for ChatChunk {
    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Adapt a buffered result: structured dump when the payload matches the
/// chat-completion shape, raw passthrough otherwise.
fn adapt_result(value: Value) -> Box<dyn JsonBody> {
    match serde_json::from_value::<ChatCompletion>(value.clone()) {
        Ok(typed) => Box::new(typed),
        Err(_) => Box::new(RawJson(value)),
    }
}

/// Same priority order for stream chunks.
fn adapt_chunk(value: Value) -> Box<dyn JsonBody> {
    match serde_json::from_value::<ChatChunk>(value.clone()) {
        Ok(typed) => Box::new(typed),
        Err(_) => Box::new(RawJson(value)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Completion engine backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpCompletionEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCompletionEngine {
    /// Build an engine bound to `base_url`. With no `request_timeout`,
    /// requests never time out - long completions must not be truncated.
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
            .context("Failed to create completion engine HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    async fn post_payload(&self, payload: RequestPayload) -> Result<reqwest::Response, EngineError> {
        let response = self
            .client
            .post(self.completions_url())
            .json(&Value::Object(payload))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Carry the upstream error text, bounded, into the engine error
        let body = response.bytes().await.unwrap_or_default();
        let text: String = String::from_utf8_lossy(&body)
            .trim()
            .chars()
            .take(ERROR_BODY_LIMIT)
            .collect();
        Err(EngineError::new(format!(
            "upstream returned {status}: {text}"
        )))
    }
}

#[async_trait]
impl CompletionEngine for HttpCompletionEngine {
    async fn complete(&self, payload: RequestPayload) -> Result<Box<dyn JsonBody>, EngineError> {
        let response = self.post_payload(payload).await?;
        let body = response.bytes().await?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| EngineError::new(format!("upstream returned invalid JSON: {e}")))?;
        Ok(adapt_result(value))
    }

    async fn stream(&self, payload: RequestPayload) -> Result<ChunkStream, EngineError> {
        let response = self.post_payload(payload).await?;
        Ok(decode_sse(response.bytes_stream().boxed()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE decoding
// ─────────────────────────────────────────────────────────────────────────────

struct SseDecoder {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: String,
    queued: VecDeque<Result<Box<dyn JsonBody>, EngineError>>,
    finished: bool,
}

impl SseDecoder {
    /// Split complete lines out of the buffer, queueing one chunk per
    /// parsed `data:` frame. `[DONE]` ends the sequence.
    fn drain_lines(&mut self) {
        while !self.finished {
            let Some(pos) = self.buffer.find('\n') else {
                break;
            };
            let line: String = self.buffer.drain(..=pos).collect();
            self.push_line(line.trim());
        }
    }

    fn push_line(&mut self, line: &str) {
        if sse::is_done_frame(line) {
            self.finished = true;
            return;
        }
        // Non-data lines (event names, comments, keep-alives) are skipped
        if let Some(value) = sse::parse_data_line(line) {
            self.queued.push_back(Ok(adapt_chunk(value)));
        }
    }
}

/// Turn an SSE byte stream into a chunk stream.
///
/// Pull-based: bytes are only read when the consumer asks for the next
/// chunk, so dropping the returned stream aborts the upstream response.
fn decode_sse(bytes: BoxStream<'static, reqwest::Result<Bytes>>) -> ChunkStream {
    let decoder = SseDecoder {
        bytes,
        buffer: String::new(),
        queued: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(item) = decoder.queued.pop_front() {
                return Some((item, decoder));
            }
            if decoder.finished {
                return None;
            }

            match decoder.bytes.next().await {
                Some(Ok(chunk)) => {
                    decoder.buffer.push_str(&String::from_utf8_lossy(&chunk));
                    decoder.drain_lines();
                }
                Some(Err(e)) => {
                    // Transport failure mid-stream: surface once, then stop
                    decoder.finished = true;
                    return Some((Err(EngineError::from(e)), decoder));
                }
                None => {
                    decoder.finished = true;
                    // A final frame without a trailing newline still counts
                    let leftover = std::mem::take(&mut decoder.buffer);
                    decoder.push_line(leftover.trim());
                    match decoder.queued.pop_front() {
                        Some(item) => return Some((item, decoder)),
                        None => return None,
                    }
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn byte_stream(parts: Vec<&'static str>) -> BoxStream<'static, reqwest::Result<Bytes>> {
        futures::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p)))).boxed()
    }

    async fn collect(stream: ChunkStream) -> Vec<Result<Value, String>> {
        stream
            .map(|item| item.map(|c| c.to_json()).map_err(|e| e.to_string()))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_decode_sse_splits_frames() {
        let stream = decode_sse(byte_stream(vec![
            "data: {\"id\":\"a\"}\n\ndata: {\"id\":\"b\"}\n\n",
            "data: [DONE]\n\n",
        ]));
        let chunks = collect(stream).await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap()["id"], "a");
        assert_eq!(chunks[1].as_ref().unwrap()["id"], "b");
    }

    #[tokio::test]
    async fn test_decode_sse_handles_frames_split_across_reads() {
        let stream = decode_sse(byte_stream(vec![
            "data: {\"id\":",
            "\"a\"}\n",
            "\ndata: [DONE]\n\n",
        ]));
        let chunks = collect(stream).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap()["id"], "a");
    }

    #[tokio::test]
    async fn test_decode_sse_ignores_frames_after_done() {
        let stream = decode_sse(byte_stream(vec![
            "data: {\"id\":\"a\"}\n\ndata: [DONE]\n\ndata: {\"id\":\"late\"}\n\n",
        ]));
        let chunks = collect(stream).await;
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_decode_sse_flushes_trailing_frame_without_newline() {
        let stream = decode_sse(byte_stream(vec!["data: {\"id\":\"tail\"}"]));
        let chunks = collect(stream).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap()["id"], "tail");
    }

    #[tokio::test]
    async fn test_decode_sse_skips_event_and_comment_lines() {
        let stream = decode_sse(byte_stream(vec![
            "event: message\n: keep-alive\ndata: {\"id\":\"a\"}\n\ndata: [DONE]\n\n",
        ]));
        let chunks = collect(stream).await;
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_adapt_result_prefers_structured_dump() {
        let value = json!({
            "id": "cmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "m",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}}],
            "usage": {"total_tokens": 3},
            "system_fingerprint": "fp_x"
        });
        let body = adapt_result(value.clone());
        // The structured dump round-trips every field, including unknown ones
        assert_eq!(body.to_json(), value);
    }

    #[test]
    fn test_adapt_result_falls_back_to_raw_passthrough() {
        let value = json!({"totally": "unrecognized"});
        let body = adapt_result(value.clone());
        assert_eq!(body.to_json(), value);
    }
}
