//! Answer backend factory.
//!
//! This module creates LLM clients from application configuration. It handles
//! backend resolution and credential injection.

use crate::client::LlmClient;
use crate::providers::{ExtractiveClient, OllamaClient, OpenAiClient};
use bookqa_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the backend name.
///
/// # Arguments
/// * `provider` - Backend identifier ("openai", "ollama", "extractive")
/// * `config` - Application configuration (endpoints, credential, timeouts)
///
/// # Errors
/// Returns error if:
/// - Backend is unknown
/// - Required credential is missing
pub fn create_client(provider: &str, config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "openai" => {
            let api_key = config.api_key.as_deref().ok_or_else(|| {
                AppError::Config("OpenAI provider requires API key".to_string())
            })?;
            let client = OpenAiClient::new(&config.remote.endpoint, api_key)?
                .with_timeout(Duration::from_secs(config.remote.timeout_secs));
            Ok(Arc::new(client))
        }
        "ollama" => {
            let client = OllamaClient::with_base_url(&config.local.ollama_endpoint)
                .with_timeout(Duration::from_secs(config.local.timeout_secs));
            Ok(Arc::new(client))
        }
        "extractive" => Ok(Arc::new(ExtractiveClient::new())),
        _ => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", &AppConfig::default()).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_extractive_client() {
        let client = create_client("Extractive", &AppConfig::default()).unwrap();
        assert_eq!(client.provider_name(), "extractive");
        assert!(client.echoes_prompt());
    }

    #[test]
    fn test_openai_requires_api_key() {
        match create_client("openai", &AppConfig::default()) {
            Err(err) => assert!(err.to_string().contains("OpenAI provider requires API key")),
            Ok(_) => panic!("Expected error for OpenAI without API key"),
        }
    }

    #[test]
    fn test_create_openai_with_key() {
        let config = AppConfig {
            api_key: Some("sk-test".to_string()),
            ..AppConfig::default()
        };
        let client = create_client("openai", &config).unwrap();
        assert_eq!(client.provider_name(), "openai");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", &AppConfig::default()) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
