//! Embedding provider implementations.

pub mod fallback;
pub mod openai;
pub mod trigram;

pub use fallback::FallbackProvider;
pub use openai::OpenAiProvider;
pub use trigram::TrigramProvider;
