//! Error types for BookQA.
//!
//! This module defines a unified error enum that covers every failure category
//! in the retrieval-and-answering pipeline: configuration, I/O, embeddings,
//! answer generation, the vector index, input validation and timeouts.

use thiserror::Error;

/// Unified error type for BookQA.
///
/// Provider errors (`Embedding`, `AnswerGeneration`) are only raised once every
/// configured fallback has been exhausted. `Index` errors are soft at the index
/// boundary: they are logged and degraded to empty results there.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No embedding provider available, or the provider failed with no fallback
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// No answer backend available, or the remote backend failed with no fallback
    #[error("Answer generation error: {0}")]
    AnswerGeneration(String),

    /// Vector index backend errors
    #[error("Index error: {0}")]
    Index(String),

    /// Rejected input (blank question, zero records, unreadable PDF)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A network call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error came from a deadline rather than a failed response.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Timeout(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
