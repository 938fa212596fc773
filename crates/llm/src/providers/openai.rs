//! OpenAI chat completions provider.
//!
//! API: https://platform.openai.com/docs/api-reference/chat

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::providers::map_request_error;
use bookqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    endpoint: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client for `endpoint` (e.g. `https://api.openai.com/v1`).
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Config(
                "OpenAI provider requires API key".to_string(),
            ));
        }

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        })
    }

    /// Set the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn to_chat_request<'a>(&self, request: &'a LlmRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    #[tracing::instrument(skip_all, fields(model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending chat completion request to OpenAI");

        let url = format!("{}/chat/completions", self.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&self.to_chat_request(request))
            .send()
            .await
            .map_err(|e| map_request_error("OpenAI", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::AnswerGeneration(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            AppError::AnswerGeneration(format!("Failed to parse OpenAI response: {}", e))
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AppError::AnswerGeneration("OpenAI response contained no choices".to_string())
            })?;

        let usage = chat
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        tracing::info!(
            completion_tokens = usage.completion_tokens,
            "Received completion from OpenAI"
        );

        Ok(LlmResponse {
            content,
            model: chat.model,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        match OpenAiClient::new("https://api.openai.com/v1", "  ") {
            Err(err) => assert!(err.to_string().contains("requires API key")),
            Ok(_) => panic!("Expected error for blank API key"),
        }
    }

    #[test]
    fn test_chat_request_messages() {
        let client = OpenAiClient::new("https://api.openai.com/v1/", "sk-test").unwrap();
        assert_eq!(client.endpoint, "https://api.openai.com/v1");

        let request = LlmRequest::new("Question?", "gpt-3.5-turbo")
            .with_system("Be helpful.")
            .with_max_tokens(500)
            .with_temperature(0.7);
        let json = serde_json::to_value(client.to_chat_request(&request)).unwrap();

        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "Be helpful.");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Question?");
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{
            "model": "gpt-3.5-turbo-0125",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Paris."}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 2, "total_tokens": 42}
        }"#;
        let chat: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(chat.choices[0].message.content.as_deref(), Some("Paris."));
        assert_eq!(chat.usage.map(|u| u.prompt_tokens), Some(40));
    }
}
