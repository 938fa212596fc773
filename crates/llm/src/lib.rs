//! Answer generation crate for BookQA.
//!
//! This crate provides a backend-agnostic abstraction for turning a question
//! plus retrieved context into an answer. Backends share the [`LlmClient`]
//! trait and are chained by [`AnswerService`].
//!
//! # Backends
//! - **OpenAI**: remote chat completions, used when an API key is present
//! - **Ollama**: local LLM runtime, used when its server is reachable
//! - **Extractive**: in-process sentence extraction, always available
//!
//! # Example
//! ```no_run
//! use bookqa_core::AppConfig;
//! use bookqa_llm::AnswerService;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let service = AnswerService::from_config(&config).await;
//! let answer = service
//!     .generate("Who wrote it?", "[Source 1] Ada wrote it.", 200)
//!     .await?;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```

pub mod answer;
pub mod client;
pub mod factory;
pub mod prompt;
pub mod providers;

// Re-export main types
pub use answer::{AnswerBackend, AnswerService, LOCAL_FAILURE_ANSWER, SYSTEM_MESSAGE};
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use prompt::build_answer_prompt;
pub use providers::{ExtractiveClient, OllamaClient, OpenAiClient};
