//! Knowledge base for BookQA.
//!
//! Turns PDF text into embedded passages stored in a SQLite vector index and
//! answers questions against them.
//!
//! # Example
//! ```no_run
//! use bookqa_core::AppConfig;
//! use bookqa_knowledge::RetrievalPipeline;
//!
//! # async fn example() -> bookqa_core::AppResult<()> {
//! let config = AppConfig::load()?;
//! let pipeline = RetrievalPipeline::from_config(&config).await?;
//!
//! pipeline
//!     .ingest(&["Paris is the capital of France.".to_string()], None)
//!     .await;
//! let result = pipeline
//!     .query("What is the capital of France?", &pipeline.default_options())
//!     .await;
//! println!("{}", result.answer);
//! # Ok(())
//! # }
//! ```

pub mod embeddings;
pub mod index;
pub mod pdf;
pub mod pipeline;
pub mod splitter;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{EmbeddingProvider, EmbeddingService};
pub use index::{SqliteIndex, VectorIndex};
pub use pipeline::RetrievalPipeline;
pub use splitter::TextChunker;
pub use types::{
    Chunk, IndexedRecord, Metadata, MetadataFilter, QueryMetadata, QueryOptions, QueryResult,
    SearchResult, SourcePassage,
};
