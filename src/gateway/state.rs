//! Gateway state shared across request handlers

use std::sync::Arc;

use axum::http::HeaderValue;

use crate::config::HostHeaderPolicy;
use crate::engine::CompletionEngine;

use super::upstream::UpstreamHandle;

/// Shared state for the gateway server
#[derive(Clone)]
pub struct GatewayState {
    /// Lifecycle-guarded handle to the one upstream client
    pub(super) upstream: Arc<UpstreamHandle>,
    /// Completion engine collaborator
    pub(super) engine: Arc<dyn CompletionEngine>,
    /// Authority written into the Host header under the rewrite policy
    pub(super) backend_authority: HeaderValue,
    /// Host header handling for relayed requests
    pub(super) host_header: HostHeaderPolicy,
}
