//! Embedding provider trait and factory.

use crate::embeddings::providers::{OpenAiProvider, TrigramProvider};
use crate::embeddings::LOCAL_EMBEDDING_DIMENSION;
use bookqa_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "openai", "trigram")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    ///
    /// Returns one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider by name.
///
/// # Arguments
/// * `provider` - "openai" (remote, needs the API key) or "trigram" (local)
/// * `config` - Application configuration
pub fn create_provider(provider: &str, config: &AppConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match provider {
        "openai" => {
            let api_key = config.api_key.as_deref().ok_or_else(|| {
                AppError::Config("OpenAI embedding provider requires API key".to_string())
            })?;
            let provider = OpenAiProvider::new(
                &config.remote.endpoint,
                api_key,
                &config.remote.embedding_model,
            )?
            .with_timeout(Duration::from_secs(config.remote.timeout_secs));
            Ok(Arc::new(provider))
        }

        "trigram" => Ok(Arc::new(TrigramProvider::new(LOCAL_EMBEDDING_DIMENSION))),

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: openai, trigram",
            provider
        ))),
    }
}
