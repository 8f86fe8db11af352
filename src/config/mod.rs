//! Configuration for the gateway
//!
//! Configuration is loaded in order of precedence:
//! 1. CLI flags (applied once, before anything starts)
//! 2. Environment variables
//! 3. Config file (~/.config/memgate/config.toml)
//! 4. Built-in defaults (lowest priority)

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod backend;
mod memory;
mod observability;
mod serialization;
mod upstream;


// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (maintain public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use backend::{BackendConfig, FileBackend};
pub use memory::{FileMemory, MemoryConfig};
pub use observability::{FileLogging, LogRotation, LoggingConfig};
pub use upstream::{FileUpstream, HostHeaderPolicy, UpstreamConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the gateway server to
    pub bind_addr: SocketAddr,

    /// Embedded backend process settings
    pub backend: BackendConfig,

    /// Upstream client settings (usually the embedded backend's loopback URL)
    pub upstream: UpstreamConfig,

    /// Memory / ingestion collaborator settings
    pub memory: MemoryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".parse().unwrap(),
            backend: BackendConfig::default(),
            upstream: UpstreamConfig::default(),
            memory: MemoryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure (subset of Config that makes sense to persist)
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub bind_addr: Option<String>,

    /// Optional [backend] section
    pub backend: Option<FileBackend>,

    /// Optional [upstream] section
    pub upstream: Option<FileUpstream>,

    /// Optional [memory] section
    pub memory: Option<FileMemory>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Get the config file path: ~/.config/memgate/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("memgate").join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist
    /// Called during startup to help users discover configuration options
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        // Don't overwrite existing config
        if path.exists() {
            return;
        }

        // Create parent directory
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // Silently fail - config is optional
            }
        }

        // Use Config::default().to_toml() as single source of truth
        let template = Self::default().to_toml();

        // Write config (ignore errors - config is optional)
        let _ = std::fs::write(&path, template);
    }

    /// Load file config if it exists
    ///
    /// # Panics
    /// If config file exists but cannot be parsed. This is intentional -
    /// a broken config should fail fast with a clear error, not silently
    /// fall back to defaults while the user debugs the wrong thing.
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    // Fatal error - config exists but is invalid
                    eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
                    eprintln!("║  CONFIG ERROR - Failed to parse configuration file          ║");
                    eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
                    eprintln!("  File: {}\n", path.display());
                    eprintln!("  Error: {}\n", e);
                    eprintln!("  Tip: Check for:\n");
                    eprintln!("    - Missing quotes around string values");
                    eprintln!("    - Invalid boolean values (use true/false)");
                    eprintln!("    - Typos in section names\n");
                    eprintln!("  To reset, delete the file and restart memgate.\n");
                    std::process::exit(1);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Config file doesn't exist - use defaults
                FileConfig::default()
            }
            Err(e) => {
                // File exists but can't be read (permissions, etc.)
                eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
                eprintln!("║  CONFIG ERROR - Cannot read configuration file              ║");
                eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
                eprintln!("  File: {}\n", path.display());
                eprintln!("  Error: {}\n", e);
                std::process::exit(1);
            }
        }
    }

    /// Load configuration: file -> env vars -> defaults
    pub fn from_env() -> Self {
        let file = Self::load_file_config();

        // Bind address: env > file > default
        let bind_addr = std::env::var("MEMGATE_BIND")
            .ok()
            .or(file.bind_addr)
            .unwrap_or_else(|| "0.0.0.0:8000".to_string())
            .parse()
            .expect("Invalid bind address");

        // Subconfig loading with from_file() helpers
        let mut backend = BackendConfig::from_file(file.backend);
        let mut upstream = UpstreamConfig::from_file(file.upstream);
        let memory = MemoryConfig::from_file(file.memory);
        let mut logging = LoggingConfig::from_file(file.logging);

        // Backend: env vars override the file layer
        if let Ok(host) = std::env::var("MEMGATE_BACKEND_HOST") {
            backend.host = host;
        }
        if let Some(port) = std::env::var("MEMGATE_BACKEND_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            backend.port = port;
        }
        if let Some(secs) = std::env::var("MEMGATE_BACKEND_STARTUP_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            backend.startup_timeout_secs = secs;
        }
        if let Ok(level) = std::env::var("MEMGATE_BACKEND_LOG_LEVEL") {
            backend.log_level = level;
        }
        if let Ok(path) = std::env::var("MEMGATE_BACKEND_CONFIG") {
            backend.config_path = PathBuf::from(path);
        }

        // Upstream: env vars override the file layer
        if let Ok(url) = std::env::var("MEMGATE_UPSTREAM_URL") {
            upstream.base_url = Some(url);
        }
        if let Some(secs) = std::env::var("MEMGATE_UPSTREAM_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            upstream.request_timeout_secs = Some(secs);
        }

        // Log directory: env only (runtime override)
        if let Ok(dir) = std::env::var("MEMGATE_LOG_DIR") {
            logging.file_dir = PathBuf::from(dir);
        }

        Self {
            bind_addr,
            backend,
            upstream,
            memory,
            logging,
        }
    }

    /// Apply CLI flag overrides. Runs once, before any server starts;
    /// the config is immutable afterwards.
    pub fn apply_cli(&mut self, args: &crate::cli::ServeArgs) {
        if let Some(bind) = &args.bind {
            self.bind_addr = bind.parse().expect("Invalid --bind address");
        }
        if let Some(host) = &args.backend_host {
            self.backend.host = host.clone();
        }
        if let Some(port) = args.backend_port {
            self.backend.port = port;
        }
        if let Some(secs) = args.backend_timeout {
            self.backend.startup_timeout_secs = secs;
        }
        if let Some(level) = &args.backend_log_level {
            self.backend.log_level = level.clone();
        }
        if let Some(path) = &args.backend_config {
            self.backend.config_path = PathBuf::from(path);
        }
        if let Some(url) = &args.upstream_url {
            self.upstream.base_url = Some(url.clone());
        }
    }
}
