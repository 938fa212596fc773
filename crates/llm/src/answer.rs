//! Answer service: backend selection, fallback and post-processing.
//!
//! Selection happens once at construction. The remote backend is preferred
//! when a credential is configured; the first local engine that initialises
//! is kept as its fallback (or used alone).

use crate::client::{LlmClient, LlmRequest};
use crate::factory::create_client;
use crate::prompt::{build_answer_prompt, strip_echoed_prompt};
use bookqa_core::{AppConfig, AppError, AppResult, ProviderMode};
use std::sync::Arc;

/// Answer returned when the local backend fails.
pub const LOCAL_FAILURE_ANSWER: &str = "Error generating answer with local LLM.";

/// System message sent with remote chat requests.
pub const SYSTEM_MESSAGE: &str =
    "You are a helpful assistant that answers questions based on provided context.";

/// A client together with the request settings it is called with.
#[derive(Clone)]
pub struct AnswerBackend {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: Option<f32>,
    system: Option<String>,
}

impl AnswerBackend {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
            system: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Backend name, as reported by its client.
    pub fn name(&self) -> &str {
        self.client.provider_name()
    }

    /// Build the configured backend for `name`.
    fn from_config(name: &str, config: &AppConfig) -> AppResult<Self> {
        let client = create_client(name, config)?;
        let backend = match name {
            "openai" => Self::new(client, &config.remote.chat_model)
                .with_temperature(config.remote.temperature)
                .with_system(SYSTEM_MESSAGE),
            "ollama" => Self::new(client, &config.local.ollama_model),
            _ => Self::new(client, name),
        };
        Ok(backend)
    }

    /// Run one completion and post-process the text.
    async fn answer(&self, prompt: &str, max_output_tokens: u32) -> AppResult<String> {
        let mut request = LlmRequest::new(prompt, &self.model).with_max_tokens(max_output_tokens);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(system) = &self.system {
            request = request.with_system(system.clone());
        }

        let response = self.client.complete(&request).await?;

        let text = if self.client.echoes_prompt() {
            strip_echoed_prompt(&response.content)
        } else {
            response.content.trim().to_string()
        };
        Ok(text)
    }
}

impl std::fmt::Debug for AnswerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerBackend")
            .field("provider", &self.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Generates answers from a question and its retrieved context.
#[derive(Debug, Clone, Default)]
pub struct AnswerService {
    remote: Option<AnswerBackend>,
    local: Option<AnswerBackend>,
}

impl AnswerService {
    /// Create a service from already-built backends.
    pub fn new(remote: Option<AnswerBackend>, local: Option<AnswerBackend>) -> Self {
        Self { remote, local }
    }

    /// Select backends from configuration.
    ///
    /// Never fails: a backend that cannot initialise is logged and skipped.
    /// With nothing selected, [`is_available`](Self::is_available) is false.
    pub async fn from_config(config: &AppConfig) -> Self {
        let remote = match config.provider_mode() {
            ProviderMode::Remote => match AnswerBackend::from_config("openai", config) {
                Ok(backend) => {
                    tracing::info!(model = %config.remote.chat_model, "Remote answer backend ready");
                    Some(backend)
                }
                Err(e) => {
                    tracing::warn!("Remote answer backend unavailable: {}", e);
                    None
                }
            },
            ProviderMode::Local => None,
        };

        let mut local = None;
        for engine in &config.local.engines {
            let backend = match AnswerBackend::from_config(engine, config) {
                Ok(backend) => backend,
                Err(e) => {
                    tracing::warn!("Local engine {} unavailable: {}", engine, e);
                    continue;
                }
            };

            if backend.client.probe().await {
                tracing::info!(engine = %engine, "Local answer backend ready");
                local = Some(backend);
                break;
            }
            tracing::info!(engine = %engine, "Local engine not reachable, trying next");
        }

        if remote.is_none() && local.is_none() {
            tracing::warn!("No answer backend available");
        }

        Self { remote, local }
    }

    /// Whether any backend exists.
    pub fn is_available(&self) -> bool {
        self.remote.is_some() || self.local.is_some()
    }

    /// Name of the backend tried first, if any.
    pub fn active_backend(&self) -> Option<&str> {
        self.remote
            .as_ref()
            .or(self.local.as_ref())
            .map(|backend| backend.name())
    }

    /// Name of the local fallback backend, if any.
    pub fn local_backend(&self) -> Option<&str> {
        self.local.as_ref().map(|backend| backend.name())
    }

    /// Generate an answer.
    ///
    /// A remote failure falls through to the local backend; with none
    /// configured it is returned as `AnswerGeneration`. A local failure is
    /// never an error: it yields [`LOCAL_FAILURE_ANSWER`].
    #[tracing::instrument(skip(self, context), fields(context_chars = context.len()))]
    pub async fn generate(
        &self,
        question: &str,
        context: &str,
        max_output_tokens: u32,
    ) -> AppResult<String> {
        if !self.is_available() {
            return Err(AppError::AnswerGeneration(
                "no answer backend available".to_string(),
            ));
        }

        let prompt = build_answer_prompt(question, context)?;

        if let Some(remote) = &self.remote {
            match remote.answer(&prompt, max_output_tokens).await {
                Ok(answer) => return Ok(answer),
                Err(e) if self.local.is_some() => {
                    tracing::warn!("Remote answer backend failed, falling back to local: {}", e);
                }
                Err(e) => {
                    return Err(AppError::AnswerGeneration(format!(
                        "{} failed: {}",
                        remote.name(),
                        e
                    )));
                }
            }
        }

        match &self.local {
            Some(local) => match local.answer(&prompt, max_output_tokens).await {
                Ok(answer) => Ok(answer),
                Err(e) => {
                    tracing::error!("Local answer backend {} failed: {}", local.name(), e);
                    Ok(LOCAL_FAILURE_ANSWER.to_string())
                }
            },
            None => Err(AppError::AnswerGeneration(
                "no answer backend available".to_string(),
            )),
        }
    }
}
