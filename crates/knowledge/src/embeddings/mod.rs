//! Embedding engine for the knowledge base.
//!
//! Provides provider-agnostic embedding generation. The provider is chosen
//! once, from configuration, and shared for the life of the process.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{FallbackProvider, OpenAiProvider, TrigramProvider};

use bookqa_core::{AppConfig, AppError, AppResult, ProviderMode};
use std::sync::Arc;

/// Vector length of the remote embedding model.
pub const REMOTE_EMBEDDING_DIMENSION: usize = 1536;

/// Vector length of the local trigram provider.
pub const LOCAL_EMBEDDING_DIMENSION: usize = 384;

/// Embedding contract used by ingestion and queries.
#[derive(Debug, Clone)]
pub struct EmbeddingService {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    mode: ProviderMode,
}

impl EmbeddingService {
    /// Wrap an already-built provider.
    pub fn new(provider: Option<Arc<dyn EmbeddingProvider>>, mode: ProviderMode) -> Self {
        Self { provider, mode }
    }

    /// Select a provider from configuration.
    ///
    /// Remote mode uses the remote provider with the local one (if enabled) as
    /// its per-call fallback. Local mode uses the local provider only.
    pub fn from_config(config: &AppConfig) -> Self {
        let mode = config.provider_mode();

        let local = if config.local.embeddings {
            match create_provider("trigram", config) {
                Ok(provider) => Some(provider),
                Err(e) => {
                    tracing::warn!("Local embedding provider unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let provider = match mode {
            ProviderMode::Remote => match create_provider("openai", config) {
                Ok(remote) => Some(match local {
                    Some(local) => {
                        Arc::new(FallbackProvider::new(remote, local)) as Arc<dyn EmbeddingProvider>
                    }
                    None => remote,
                }),
                Err(e) => {
                    tracing::warn!("Remote embedding provider unavailable: {}", e);
                    local
                }
            },
            ProviderMode::Local => local,
        };

        match &provider {
            Some(p) => tracing::info!(
                provider = p.provider_name(),
                model = p.model_name(),
                dimensions = p.dimensions(),
                mode = mode.as_str(),
                "Embedding provider ready"
            ),
            None => tracing::warn!("No embedding provider available"),
        }

        Self { provider, mode }
    }

    /// Mode the service was configured in.
    pub fn mode(&self) -> ProviderMode {
        self.mode
    }

    /// Whether a provider initialised.
    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// Active provider name, if any.
    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.provider_name())
    }

    /// Active provider's vector length, or 0 without a provider.
    pub fn embedding_dimension(&self) -> usize {
        self.provider.as_ref().map_or(0, |p| p.dimensions())
    }

    /// Embed texts, one vector per input, in order.
    ///
    /// # Errors
    /// * `AppError::Validation` - empty input or a blank text
    /// * `AppError::Embedding` - no provider, or every provider failed
    pub async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(AppError::Validation("no texts to embed".to_string()));
        }
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(AppError::Validation(format!("text {} is blank", pos)));
        }

        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| AppError::Embedding("no provider available".to_string()))?;

        tracing::debug!(
            "Embedding {} texts using provider '{}' (model: {})",
            texts.len(),
            provider.provider_name(),
            provider.model_name()
        );

        let embeddings = provider.embed_batch(texts).await.map_err(|e| match e {
            AppError::Embedding(_) => e,
            other => AppError::Embedding(other.to_string()),
        })?;

        if embeddings.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut embeddings = self.embed(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_mode_uses_trigram() {
        let service = EmbeddingService::from_config(&AppConfig::default());
        assert_eq!(service.mode(), ProviderMode::Local);
        assert_eq!(service.provider_name(), Some("trigram"));
        assert_eq!(service.embedding_dimension(), LOCAL_EMBEDDING_DIMENSION);

        let embeddings = service
            .embed(&["hello world".to_string(), "test embedding".to_string()])
            .await
            .unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 384);
    }

    #[tokio::test]
    async fn test_remote_mode_reports_remote_dimension() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-test".to_string());

        let service = EmbeddingService::from_config(&config);
        assert_eq!(service.mode(), ProviderMode::Remote);
        assert_eq!(service.provider_name(), Some("openai"));
        assert_eq!(service.embedding_dimension(), REMOTE_EMBEDDING_DIMENSION);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_local_vectors() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-test".to_string());
        config.remote.endpoint = "http://127.0.0.1:9".to_string();
        config.remote.timeout_secs = 2;

        let remote = OpenAiProvider::new(&config.remote.endpoint, "sk-test", "text-embedding-3-small")
            .unwrap()
            .with_max_retries(1);
        let service = EmbeddingService::new(
            Some(Arc::new(FallbackProvider::new(
                Arc::new(remote),
                Arc::new(TrigramProvider::new(LOCAL_EMBEDDING_DIMENSION)),
            ))),
            ProviderMode::Remote,
        );

        let embeddings = service.embed(&["hello".to_string()]).await.unwrap();
        assert_eq!(embeddings[0].len(), LOCAL_EMBEDDING_DIMENSION);
    }

    #[tokio::test]
    async fn test_no_provider() {
        let mut config = AppConfig::default();
        config.local.embeddings = false;

        let service = EmbeddingService::from_config(&config);
        assert!(!service.is_available());
        assert_eq!(service.embedding_dimension(), 0);

        let result = service.embed(&["hello".to_string()]).await;
        match result {
            Err(AppError::Embedding(msg)) => assert_eq!(msg, "no provider available"),
            other => panic!("Expected embedding error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_and_blank_input() {
        let service = EmbeddingService::from_config(&AppConfig::default());
        assert!(matches!(
            service.embed(&[]).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.embed(&["ok".to_string(), "   ".to_string()]).await,
            Err(AppError::Validation(_))
        ));
    }
}
