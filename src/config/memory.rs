//! Memory / ingestion collaborator configuration
//!
//! The memory service is enabled once at process startup and never touched
//! again by the gateway; only its activation flags live here. The optional
//! provider override is resolved from environment variables at enable time
//! (see `crate::memory`).

use serde::Deserialize;

/// Memory collaborator settings
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Activate the memory service at startup
    pub enabled: bool,
    /// Promote essential context into working memory
    pub conscious_ingest: bool,
    /// Ingest conversation context automatically per request
    pub auto_ingest: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            conscious_ingest: true,
            auto_ingest: true,
        }
    }
}

/// Memory settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileMemory {
    pub enabled: Option<bool>,
    pub conscious_ingest: Option<bool>,
    pub auto_ingest: Option<bool>,
}

impl MemoryConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileMemory>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            enabled: file.enabled.unwrap_or(defaults.enabled),
            conscious_ingest: file.conscious_ingest.unwrap_or(defaults.conscious_ingest),
            auto_ingest: file.auto_ingest.unwrap_or(defaults.auto_ingest),
        }
    }
}
