//! Primary-then-fallback embedding decorator.

use crate::embeddings::provider::EmbeddingProvider;
use bookqa_core::AppResult;
use std::sync::Arc;

/// Tries the primary provider and, when that call fails, the fallback.
///
/// Name, model and dimension are reported from the primary.
#[derive(Debug, Clone)]
pub struct FallbackProvider {
    primary: Arc<dyn EmbeddingProvider>,
    fallback: Arc<dyn EmbeddingProvider>,
}

impl FallbackProvider {
    pub fn new(primary: Arc<dyn EmbeddingProvider>, fallback: Arc<dyn EmbeddingProvider>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FallbackProvider {
    fn provider_name(&self) -> &str {
        self.primary.provider_name()
    }

    fn model_name(&self) -> &str {
        self.primary.model_name()
    }

    fn dimensions(&self) -> usize {
        self.primary.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        match self.primary.embed_batch(texts).await {
            Ok(embeddings) => Ok(embeddings),
            Err(e) => {
                tracing::warn!(
                    "Embedding provider {} failed, using {}: {}",
                    self.primary.provider_name(),
                    self.fallback.provider_name(),
                    e
                );
                self.fallback.embed_batch(texts).await
            }
        }
    }
}
