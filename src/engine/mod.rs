//! Completion engine - the collaborator that executes completion requests
//!
//! The gateway's completion dispatcher is written against this trait and
//! never inspects engine payloads beyond asking them to render as JSON.
//! Engines take the request mapping opaquely and return either one result
//! or, when `stream` is set, a sequence of chunks.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

mod http;

pub use http::HttpCompletionEngine;

/// A completion request payload: arbitrary provider-specific JSON mapping.
pub type RequestPayload = serde_json::Map<String, Value>;

/// A completion result or stream chunk that can render itself as JSON.
///
/// This is the single serialization capability the dispatcher relies on.
/// Concrete engines decide internally whether rendering means a structured
/// dump of a typed response or passing a raw value through unchanged.
pub trait JsonBody: Send {
    fn to_json(&self) -> Value;
}

/// Raw passthrough for payloads with no recognized shape.
pub struct RawJson(pub Value);

impl JsonBody for RawJson {
    fn to_json(&self) -> Value {
        self.0.clone()
    }
}

/// Boxed chunk sequence produced by a streaming completion.
///
/// Items are pulled one at a time; dropping the stream aborts whatever
/// upstream work feeds it.
pub type ChunkStream = BoxStream<'static, Result<Box<dyn JsonBody>, EngineError>>;

/// Error raised by a completion engine, either on dispatch or while the
/// chunk sequence is being consumed.
#[derive(Debug)]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EngineError {}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// The completion engine contract.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Execute a buffered completion. The payload's `stream` field is
    /// absent or false.
    async fn complete(&self, payload: RequestPayload) -> Result<Box<dyn JsonBody>, EngineError>;

    /// Execute a streaming completion. The payload carries `stream: true`.
    /// An error here means the engine failed before producing a sequence;
    /// failures mid-sequence surface as `Err` items on the stream.
    async fn stream(&self, payload: RequestPayload) -> Result<ChunkStream, EngineError>;
}
