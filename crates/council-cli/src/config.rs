//! CLI configuration: TOML file with environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Provider endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    /// OpenAI-compatible chat-completions URL.
    pub endpoint: String,
    /// Bearer token, when the endpoint requires one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Default model identifier for personas.
    pub model: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:1234/v1/chat/completions".to_string(),
            api_key: None,
            model: "local-model".to_string(),
        }
    }
}

/// Top-level CLI configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CliConfig {
    pub provider: ProviderSettings,
    /// Session store directory. Defaults to `./council-sessions`.
    pub store_dir: Option<PathBuf>,
    /// Directory of knowledge documents (`*.md`, `*.txt`) loaded at start.
    pub knowledge_dir: Option<PathBuf>,
    /// Sandbox root for the filesystem tools. Tools are not registered
    /// without it.
    pub workspace: Option<PathBuf>,
    /// SearxNG-style search endpoint for the web search tool.
    pub search_endpoint: Option<String>,
    /// Use the provider to rank dynamic persona suggestions.
    pub dynamic_personas: bool,
}

impl CliConfig {
    /// Load from a TOML file when given, then apply `COUNCIL_*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("COUNCIL_PROVIDER_URL") {
            config.provider.endpoint = url;
        }
        if let Ok(key) = std::env::var("COUNCIL_PROVIDER_API_KEY") {
            config.provider.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("COUNCIL_MODEL") {
            config.provider.model = model;
        }
        if let Ok(dir) = std::env::var("COUNCIL_STORE_DIR") {
            config.store_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("council-sessions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert!(config.provider.endpoint.contains("chat/completions"));
        assert_eq!(config.store_dir(), PathBuf::from("council-sessions"));
        assert!(!config.dynamic_personas);
    }

    #[test]
    fn test_toml_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("council.toml");
        std::fs::write(
            &path,
            r#"
store_dir = "/tmp/council"
dynamic_personas = true

[provider]
endpoint = "http://gpu-box:8080/v1/chat/completions"
model = "qwen-72b"
"#,
        )
        .unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.provider.model, "qwen-72b");
        assert_eq!(config.store_dir(), PathBuf::from("/tmp/council"));
        assert!(config.dynamic_personas);
        assert!(config.workspace.is_none());
    }

    #[test]
    fn test_bad_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "provider = 7").unwrap();
        assert!(CliConfig::load(Some(&path)).is_err());
    }
}
