//! Embedded backend process configuration
//!
//! The backend is the model-routing service the gateway fronts. It runs on a
//! loopback port on its own execution context; these settings are fixed once
//! the supervisor launches it.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Embedded backend process settings
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Host the backend binds to (loopback unless deliberately exposed)
    pub host: String,
    /// Port the backend binds to
    pub port: u16,
    /// How long to wait for the backend health check before aborting startup
    pub startup_timeout_secs: u64,
    /// Log level for the backend module (the gateway keeps its own level)
    pub log_level: String,
    /// Path to the backend's model table (TOML)
    pub config_path: PathBuf,
    /// Run the embedded backend. Disabled automatically when the upstream
    /// points at an external API instead.
    pub embedded: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10001,
            startup_timeout_secs: 15,
            log_level: "warn".to_string(),
            config_path: PathBuf::from("./backend_models.toml"),
            embedded: true,
        }
    }
}

impl BackendConfig {
    /// Base URL for the backend's HTTP surface
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// host:port authority, used when rewriting the Host header
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Startup readiness deadline
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

/// Backend settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileBackend {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub startup_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub config_path: Option<String>,
    pub embedded: Option<bool>,
}

impl BackendConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileBackend>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            host: file.host.unwrap_or(defaults.host),
            port: file.port.unwrap_or(defaults.port),
            startup_timeout_secs: file
                .startup_timeout_secs
                .unwrap_or(defaults.startup_timeout_secs),
            log_level: file.log_level.unwrap_or(defaults.log_level),
            config_path: file
                .config_path
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            embedded: file.embedded.unwrap_or(defaults.embedded),
        }
    }
}
