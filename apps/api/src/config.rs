use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::llm_client::providers::ProviderRegistry;

const DEFAULT_PROVIDER: &str = "ollama";

/// Application configuration loaded from environment variables.
///
/// Read once at startup and handed to the gateway; nothing downstream touches
/// the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_provider: String,
    pub llm_model: Option<String>,
    /// API keys keyed by provider id.
    pub api_keys: HashMap<String, String>,
    /// Base URL overrides keyed by provider id.
    pub base_urls: HashMap<String, String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Variable names come from the
    /// provider catalog.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let registry = ProviderRegistry::builtin();
        let mut api_keys = HashMap::new();
        let mut base_urls = HashMap::new();
        for provider in registry.all() {
            if let Some(key) = provider.api_key_env.and_then(|var| get(var)) {
                api_keys.insert(provider.id.clone(), key);
            }
            if let Some(url) = provider.base_url_env.and_then(|var| get(var)) {
                base_urls.insert(provider.id.clone(), url);
            }
        }

        Ok(Config {
            llm_provider: get("LLM_PROVIDER")
                .map(|p| p.to_lowercase())
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            llm_model: get("LLM_MODEL"),
            api_keys,
            base_urls,
            port: get("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.llm_provider, "ollama");
        assert!(config.llm_model.is_none());
        assert!(config.api_keys.is_empty());
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_provider_specific_variables() {
        let config = Config::from_lookup(lookup(&[
            ("LLM_PROVIDER", "OpenAI"),
            ("LLM_MODEL", "gpt-4o"),
            ("OPENAI_API_KEY", "sk-abc"),
            ("LMSTUDIO_BASE_URL", "http://gpu-box:1234"),
            ("GEMINI_API_KEY", "   "),
        ]))
        .unwrap();
        assert_eq!(config.llm_provider, "openai");
        assert_eq!(config.llm_model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.api_keys.get("openai").map(String::as_str), Some("sk-abc"));
        assert!(!config.api_keys.contains_key("gemini"));
        assert_eq!(
            config.base_urls.get("lmstudio").map(String::as_str),
            Some("http://gpu-box:1234")
        );
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
