//! LLM client abstraction and request/response types.
//!
//! Every answer backend (remote chat API, local server, in-process model)
//! implements [`LlmClient`], so the answer service can chain them.

use bookqa_core::AppResult;
use serde::{Deserialize, Serialize};

/// LLM completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The prompt text to send to the LLM
    pub prompt: String,

    /// Model identifier (e.g., "llama2", "gpt-3.5-turbo")
    pub model: String,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// System prompt (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl LlmRequest {
    /// Create a new LLM request with required fields.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            max_tokens: None,
            temperature: None,
            system: None,
        }
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// LLM completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,

    /// Model that generated the response
    pub model: String,

    /// Usage statistics
    pub usage: LlmUsage,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Trait for answer backends.
///
/// This trait abstracts the underlying backend (OpenAI, Ollama, the in-process
/// extractive model) and provides a unified completion interface.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "ollama", "openai").
    fn provider_name(&self) -> &str;

    /// Perform a completion.
    ///
    /// # Arguments
    /// * `request` - The completion request
    ///
    /// # Returns
    /// The complete LLM response
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;

    /// Whether the generated text starts with the prompt itself.
    ///
    /// Callers strip everything up to the final `Answer:` marker for such backends.
    fn echoes_prompt(&self) -> bool {
        false
    }

    /// Whether the backend can serve requests right now.
    ///
    /// Backends that depend on a running server override this with a cheap probe.
    async fn probe(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("Hello", "llama2")
            .with_max_tokens(64)
            .with_temperature(0.2)
            .with_system("be brief");
        assert_eq!(request.max_tokens, Some(64));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.system.as_deref(), Some("be brief"));
    }

    #[test]
    fn test_request_skips_unset_fields() {
        let json = serde_json::to_value(LlmRequest::new("Hi", "m")).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_usage_total() {
        let usage = LlmUsage::new(12, 30);
        assert_eq!(usage.total_tokens, 42);
    }
}
