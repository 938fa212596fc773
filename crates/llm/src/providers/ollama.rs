//! Ollama LLM provider implementation.
//!
//! This module provides integration with Ollama, a local LLM runtime.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::providers::map_request_error;
use bookqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reachability probe deadline.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// Per-request deadline
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(120),
            client: reqwest::Client::new(),
        }
    }

    /// Set the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Convert LlmRequest to Ollama format.
    fn to_ollama_request(&self, request: &LlmRequest) -> OllamaRequest {
        OllamaRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream: false,
        }
    }

    /// Convert Ollama response to LlmResponse.
    fn convert_response(&self, response: OllamaResponse) -> LlmResponse {
        let usage = LlmUsage::new(
            response.prompt_eval_count.unwrap_or(0),
            response.eval_count.unwrap_or(0),
        );

        LlmResponse {
            content: response.response,
            model: response.model,
            usage,
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[tracing::instrument(skip_all, fields(model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to Ollama");

        let ollama_request = self.to_ollama_request(request);
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| map_request_error("Ollama", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::AnswerGeneration(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            AppError::AnswerGeneration(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::info!("Received completion from Ollama");
        tracing::debug!("Response: {:?}", ollama_response);

        Ok(self.convert_response(ollama_response))
    }

    /// Check whether the server answers at all.
    ///
    /// Backend selection only keeps this client when the probe succeeds.
    async fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Ollama probe failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
        assert!(!client.echoes_prompt());
    }

    #[test]
    fn test_ollama_request_conversion() {
        let client = OllamaClient::with_base_url("http://gpu-box:11434/");
        let request = LlmRequest::new("Hello", "llama2")
            .with_temperature(0.7)
            .with_max_tokens(100);

        let ollama_req = client.to_ollama_request(&request);
        assert_eq!(client.base_url, "http://gpu-box:11434");
        assert_eq!(ollama_req.model, "llama2");
        assert_eq!(ollama_req.prompt, "Hello");
        assert_eq!(ollama_req.options.temperature, Some(0.7));
        assert_eq!(ollama_req.options.num_predict, Some(100));
        assert!(!ollama_req.stream);
    }

    #[test]
    fn test_ollama_request_serializes_options() {
        let client = OllamaClient::new();
        let request = LlmRequest::new("Hello", "llama2").with_max_tokens(500);
        let json = serde_json::to_value(client.to_ollama_request(&request)).unwrap();
        assert_eq!(json["options"]["num_predict"], 500);
        assert!(json["options"].get("temperature").is_none());
    }

    #[tokio::test]
    async fn test_probe_unreachable_server() {
        // Port 9 (discard) is not an Ollama server
        let client = OllamaClient::with_base_url("http://127.0.0.1:9");
        assert!(!client.probe().await);
    }
}
