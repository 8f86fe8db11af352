//! Request handlers for the gateway
//!
//! This module contains the completion dispatcher (buffered JSON and SSE
//! streaming modes) and the transparent relay that forwards everything
//! else to the backend.

mod completions;
mod relay;

pub use completions::completions_handler;
pub use relay::relay_handler;
