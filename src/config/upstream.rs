//! Upstream client configuration
//!
//! By default the upstream is the embedded backend's loopback URL. Setting
//! `base_url` points the gateway at a third-party API instead; the embedded
//! backend is then not started.

use serde::Deserialize;
use std::time::Duration;

use super::BackendConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Host Header Policy
// ─────────────────────────────────────────────────────────────────────────────

/// What to do with the inbound Host header when relaying.
///
/// Some backends validate Host, so copying the client's value blindly is
/// wrong in both directions. The choice is explicit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostHeaderPolicy {
    /// Replace Host with the backend's own host:port
    Rewrite,
    /// Drop Host and let the HTTP client fill in the target's
    Strip,
}

impl HostHeaderPolicy {
    /// Parse policy string from config
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "rewrite" => Self::Rewrite,
            "strip" => Self::Strip,
            _ => Self::Rewrite, // Default to rewrite for unknown values
        }
    }

    /// Convert to string for TOML serialization
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rewrite => "rewrite",
            Self::Strip => "strip",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Upstream Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Upstream client settings
#[derive(Debug, Clone, Default)]
pub struct UpstreamConfig {
    /// Explicit upstream base URL. None means the embedded backend.
    pub base_url: Option<String>,
    /// Per-request timeout. None (the default) means no timeout - long
    /// streaming completions must not be truncated.
    pub request_timeout_secs: Option<u64>,
    /// Host header handling. None resolves to rewrite for the embedded
    /// backend and strip for an external upstream.
    pub host_header: Option<HostHeaderPolicy>,
}

impl UpstreamConfig {
    /// True when the upstream is an external API rather than the
    /// supervised backend
    pub fn is_external(&self) -> bool {
        self.base_url.is_some()
    }

    /// The base URL the upstream client binds to
    pub fn resolved_base_url(&self, backend: &BackendConfig) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| backend.base_url())
    }

    /// The effective Host header policy
    pub fn resolved_host_header(&self) -> HostHeaderPolicy {
        self.host_header.unwrap_or(if self.is_external() {
            HostHeaderPolicy::Strip
        } else {
            HostHeaderPolicy::Rewrite
        })
    }

    /// The per-request timeout, if any
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Upstream settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileUpstream {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub host_header: Option<String>,
}

impl UpstreamConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileUpstream>) -> Self {
        let file = file.unwrap_or_default();

        Self {
            base_url: file.base_url,
            request_timeout_secs: file.request_timeout_secs,
            host_header: file.host_header.map(|s| HostHeaderPolicy::from_str(&s)),
        }
    }
}
