// Memory module - the persistent-context collaborator boundary
//
// The gateway activates the memory/ingestion service exactly once at
// startup and never interacts with it afterwards; conversation capture
// happens inside the service. Only the activation surface lives here.

use anyhow::{Context, Result};

use crate::config::MemoryConfig;

/// Provider override for the memory service's own LLM calls.
///
/// Resolved from the environment (the memory service follows the OpenAI
/// SDK convention for its internal analysis calls).
#[derive(Debug, Clone)]
pub struct ProviderOverride {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl ProviderOverride {
    /// Read the override from OPENAI_BASE_URL / OPENAI_API_KEY /
    /// OPENAI_MODEL. Only an explicit base URL activates it.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("OPENAI_BASE_URL").ok()?;
        Some(Self {
            base_url,
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            model: std::env::var("OPENAI_MODEL").ok(),
        })
    }
}

/// Handle to the memory service
pub struct Memory {
    config: MemoryConfig,
    provider: Option<ProviderOverride>,
}

impl Memory {
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            config: config.clone(),
            provider: ProviderOverride::from_env(),
        }
    }

    /// Activate persistent context capture. Called once, before the
    /// gateway starts serving.
    pub fn enable(&self) -> Result<()> {
        if !self.config.enabled {
            tracing::debug!("Memory service disabled in config");
            return Ok(());
        }

        if let Some(provider) = &self.provider {
            // Sanity-check the override before handing it to the service
            provider
                .base_url
                .parse::<reqwest::Url>()
                .context("OPENAI_BASE_URL is not a valid URL")?;
            tracing::info!(
                base_url = %provider.base_url,
                model = provider.model.as_deref().unwrap_or("(default)"),
                "Memory service using custom provider"
            );
        }

        tracing::info!(
            conscious_ingest = self.config.conscious_ingest,
            auto_ingest = self.config.auto_ingest,
            "Memory service enabled"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_memory_enables_cleanly() {
        let memory = Memory {
            config: MemoryConfig {
                enabled: false,
                ..Default::default()
            },
            provider: None,
        };
        assert!(memory.enable().is_ok());
    }

    #[test]
    fn test_bad_provider_url_is_rejected() {
        let memory = Memory {
            config: MemoryConfig::default(),
            provider: Some(ProviderOverride {
                base_url: "not a url".to_string(),
                api_key: None,
                model: None,
            }),
        };
        assert!(memory.enable().is_err());
    }
}
