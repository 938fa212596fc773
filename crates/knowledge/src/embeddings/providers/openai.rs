//! OpenAI Embedding Provider
//!
//! Provides semantic embeddings via an OpenAI-compatible `/embeddings` endpoint.
//!
//! # Features
//! - Neural semantic embeddings (1536-dim for `text-embedding-3-small`)
//! - Whole batches in one request
//! - Automatic retry with exponential backoff
//!
//! # Example
//! ```no_run
//! use bookqa_knowledge::embeddings::{EmbeddingProvider, OpenAiProvider};
//!
//! # async fn example() -> bookqa_core::AppResult<()> {
//! let provider = OpenAiProvider::new("https://api.openai.com/v1", "sk-...", "text-embedding-3-small")?;
//! let embedding = provider.embed("Hello world").await?;
//! assert_eq!(embedding.len(), 1536);
//! # Ok(())
//! # }
//! ```

use crate::embeddings::provider::EmbeddingProvider;
use crate::embeddings::REMOTE_EMBEDDING_DIMENSION;
use async_trait::async_trait;
use bookqa_core::{AppError, AppResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const EMBEDDING_ENDPOINT: &str = "/embeddings";

/// Maximum attempts per batch
const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// OpenAI embedding provider
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    /// API base URL (e.g., "https://api.openai.com/v1")
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    timeout: Duration,
    max_retries: u32,
}

/// Request payload for the embeddings API
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from the embeddings API
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Error response body
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Whether a failed attempt is worth repeating.
enum Attempt {
    Retry(AppError),
    Fatal(AppError),
}

impl OpenAiProvider {
    /// Create a new provider.
    ///
    /// # Errors
    /// * `AppError::Config` - If the API key is blank
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Config(
                "OpenAI embedding provider requires API key".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            dimensions: REMOTE_EMBEDDING_DIMENSION,
            timeout: Duration::from_secs(30),
            max_retries: MAX_RETRIES,
        })
    }

    /// Set the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of attempts per batch (at least one).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Embed a batch with retry logic
    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_with_retries(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.embed_once(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) if attempt >= self.max_retries => return Err(e),
                Err(Attempt::Retry(e)) => {
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    warn!(
                        "Embedding failed (attempt {}/{}): {}, retrying in {}ms",
                        attempt, self.max_retries, e, backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }

    /// Embed a batch (no retries)
    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Attempt> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                Attempt::Retry(if e.is_timeout() {
                    AppError::Timeout(format!("OpenAI embeddings request: {}", e))
                } else {
                    AppError::Embedding(format!("Failed to send request to OpenAI: {}", e))
                })
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            let err = AppError::Embedding(format!("OpenAI API error ({}): {}", status, message));

            return Err(if is_retryable(status) {
                Attempt::Retry(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            Attempt::Fatal(AppError::Embedding(format!(
                "Failed to parse OpenAI response: {}",
                e
            )))
        })?;

        order_embeddings(body, texts.len(), self.dimensions).map_err(Attempt::Fatal)
    }
}

/// Rate limits and server errors are transient.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Put vectors back in input order and check their shape.
fn order_embeddings(
    body: EmbeddingResponse,
    expected: usize,
    dimensions: usize,
) -> AppResult<Vec<Vec<f32>>> {
    if body.data.len() != expected {
        return Err(AppError::Embedding(format!(
            "Expected {} embeddings, got {}",
            expected,
            body.data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in body.data {
        if item.embedding.len() != dimensions {
            return Err(AppError::Embedding(format!(
                "Unexpected embedding dimensions: got {}, expected {}",
                item.embedding.len(),
                dimensions
            )));
        }
        match slots.get_mut(item.index) {
            Some(slot) if slot.is_none() => *slot = Some(item.embedding),
            _ => {
                return Err(AppError::Embedding(format!(
                    "Invalid or duplicate embedding index {}",
                    item.index
                )))
            }
        }
    }

    slots
        .into_iter()
        .map(|slot| slot.ok_or_else(|| AppError::Embedding("Missing embedding".to_string())))
        .collect()
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "openai"))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.embed_with_retries(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(index: usize, value: f32, dims: usize) -> EmbeddingData {
        EmbeddingData {
            index,
            embedding: vec![value; dims],
        }
    }

    #[test]
    fn test_requires_api_key() {
        let result = OpenAiProvider::new("https://api.openai.com/v1", "", "text-embedding-3-small");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_provider_metadata() {
        let provider =
            OpenAiProvider::new("https://api.openai.com/v1/", "sk-test", "text-embedding-3-small")
                .unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.model_name(), "text-embedding-3-small");
        assert_eq!(provider.dimensions(), 1536);
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_request_body() {
        let input = vec!["a".to_string(), "b".to_string()];
        let body = serde_json::to_value(EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &input,
        })
        .unwrap();
        assert_eq!(body["input"][1], "b");
        assert_eq!(body["model"], "text-embedding-3-small");
    }

    #[test]
    fn test_order_embeddings_restores_input_order() {
        let body = EmbeddingResponse {
            data: vec![data(1, 2.0, 3), data(0, 1.0, 3)],
        };
        let ordered = order_embeddings(body, 2, 3).unwrap();
        assert_eq!(ordered[0], vec![1.0; 3]);
        assert_eq!(ordered[1], vec![2.0; 3]);
    }

    #[test]
    fn test_order_embeddings_rejects_bad_shapes() {
        let short = EmbeddingResponse {
            data: vec![data(0, 1.0, 3)],
        };
        assert!(order_embeddings(short, 2, 3).is_err());

        let wrong_dims = EmbeddingResponse {
            data: vec![data(0, 1.0, 4)],
        };
        assert!(order_embeddings(wrong_dims, 1, 3).is_err());

        let duplicate = EmbeddingResponse {
            data: vec![data(0, 1.0, 3), data(0, 1.0, 3)],
        };
        assert!(order_embeddings(duplicate, 2, 3).is_err());
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let provider = OpenAiProvider::new("http://127.0.0.1:9", "sk-test", "text-embedding-3-small")
            .unwrap()
            .with_max_retries(1)
            .with_timeout(Duration::from_secs(2));
        let result = provider.embed_batch(&["hello".to_string()]).await;
        assert!(result.is_err());
    }
}
