//! Backend model table
//!
//! The backend's provider routing is driven by a TOML file listing public
//! model names and the provider endpoints that serve them:
//!
//! ```toml
//! [[model_list]]
//! model_name = "gpt-4o"
//!
//! [model_list.params]
//! model = "gpt-4o-2024-08-06"
//! api_base = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//! ```
//!
//! A missing file is not an error - the backend starts with an empty table
//! and every completion resolves to 404 until one is provided.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// One resolved routing target
#[derive(Debug, Clone)]
pub struct ModelTarget {
    /// Provider-side model identifier (substituted into the request)
    pub model: String,
    /// Provider base URL, conventionally including /v1
    pub api_base: String,
    /// Resolved credential, if any
    pub api_key: Option<String>,
}

/// The loaded model table, keyed by public model name
#[derive(Debug, Default)]
pub struct ModelTable {
    targets: HashMap<String, ModelTarget>,
}

// ─────────────────────────────────────────────────────────────────────────────
// File layer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ModelFile {
    #[serde(default)]
    model_list: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    model_name: String,
    params: ModelParams,
}

#[derive(Debug, Deserialize)]
struct ModelParams {
    model: String,
    api_base: String,
    /// Literal credential; takes precedence over api_key_env
    api_key: Option<String>,
    /// Name of an environment variable holding the credential
    api_key_env: Option<String>,
}

impl ModelTable {
    /// Load the table from `path`. Missing file -> empty table with a
    /// warning; a present-but-broken file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Model table {} not found; backend starts with no models",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).context(format!("Failed to read model table {}", path.display()))
            }
        };

        let file: ModelFile = toml::from_str(&contents)
            .context(format!("Failed to parse model table {}", path.display()))?;

        let mut targets = HashMap::new();
        for entry in file.model_list {
            let name = entry.model_name.trim().to_string();
            if name.is_empty() {
                anyhow::bail!("Model table {} contains an empty model_name", path.display());
            }

            let api_key = resolve_api_key(&name, &entry.params);
            targets.insert(
                name,
                ModelTarget {
                    model: entry.params.model,
                    api_base: entry.params.api_base.trim_end_matches('/').to_string(),
                    api_key,
                },
            );
        }

        tracing::info!("Loaded {} model(s) from {}", targets.len(), path.display());
        Ok(Self { targets })
    }

    pub fn get(&self, model_name: &str) -> Option<&ModelTarget> {
        self.targets.get(model_name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Public model names, sorted for stable listings
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.targets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Explicit key wins; otherwise look up the named env var.
fn resolve_api_key(model_name: &str, params: &ModelParams) -> Option<String> {
    if let Some(key) = &params.api_key {
        return Some(key.clone());
    }
    let env_name = params.api_key_env.as_ref()?;
    match std::env::var(env_name) {
        Ok(key) => Some(key),
        Err(_) => {
            tracing::warn!(
                "Model '{}': credential env var {} is not set",
                model_name,
                env_name
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_table(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_resolves_targets() {
        let file = write_table(
            r#"
            [[model_list]]
            model_name = "gpt-4o"

            [model_list.params]
            model = "gpt-4o-2024-08-06"
            api_base = "https://api.openai.com/v1/"
            api_key = "sk-inline"
            "#,
        );

        let table = ModelTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 1);

        let target = table.get("gpt-4o").unwrap();
        assert_eq!(target.model, "gpt-4o-2024-08-06");
        // Trailing slash trimmed so URL joining stays predictable
        assert_eq!(target.api_base, "https://api.openai.com/v1");
        assert_eq!(target.api_key.as_deref(), Some("sk-inline"));
    }

    #[test]
    fn test_missing_file_yields_empty_table() {
        let table = ModelTable::load(Path::new("/nonexistent/models.toml")).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let file = write_table("model_list = \"not a table\"");
        assert!(ModelTable::load(file.path()).is_err());
    }

    #[test]
    fn test_empty_model_name_rejected() {
        let file = write_table(
            r#"
            [[model_list]]
            model_name = "  "

            [model_list.params]
            model = "m"
            api_base = "https://api.example.com/v1"
            "#,
        );
        assert!(ModelTable::load(file.path()).is_err());
    }

    #[test]
    fn test_names_are_sorted() {
        let file = write_table(
            r#"
            [[model_list]]
            model_name = "zephyr"
            [model_list.params]
            model = "z"
            api_base = "https://a.example/v1"

            [[model_list]]
            model_name = "aria"
            [model_list.params]
            model = "a"
            api_base = "https://b.example/v1"
            "#,
        );

        let table = ModelTable::load(file.path()).unwrap();
        assert_eq!(table.names(), vec!["aria", "zephyr"]);
    }
}
