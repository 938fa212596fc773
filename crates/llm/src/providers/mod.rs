//! Answer backend implementations.

pub mod extractive;
pub mod ollama;
pub mod openai;

pub use extractive::ExtractiveClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use bookqa_core::AppError;

/// Map a transport error, keeping deadlines distinguishable.
pub(crate) fn map_request_error(provider: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(format!("{} request: {}", provider, err))
    } else {
        AppError::AnswerGeneration(format!("Failed to send request to {}: {}", provider, err))
    }
}
