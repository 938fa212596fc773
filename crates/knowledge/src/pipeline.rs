//! Retrieval pipeline: ingestion and question answering.
//!
//! `RetrievalPipeline` is the single context object shared by every command.
//! Neither operation returns an error: ingestion reports success as a bool and
//! queries always produce a `QueryResult`, with a diagnostic answer when a
//! stage fails.

use crate::embeddings::EmbeddingService;
use crate::index::{SqliteIndex, VectorIndex};
use crate::types::{
    prefix_chars, IndexedRecord, Metadata, QueryMetadata, QueryOptions, QueryResult,
    SearchResult, SourcePassage, METADATA_TEXT_CHARS,
};
use bookqa_core::{AppConfig, AppError, AppResult};
use bookqa_llm::AnswerService;
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Answer for a blank question.
pub const INVALID_QUESTION_ANSWER: &str = "Please provide a valid question.";

/// Answer when `top_k` or `max_output_tokens` is zero.
pub const INVALID_OPTIONS_ANSWER: &str =
    "Please request at least one source and at least one output token.";

/// Answer when the question cannot be embedded.
pub const EMBEDDING_FAILURE_ANSWER: &str = "Error generating query embedding.";

/// Answer when retrieval finds nothing.
pub const NO_DOCUMENTS_ANSWER: &str =
    "No relevant documents found in the knowledge base. Please upload and process PDFs first.";

/// Answer when generation fails or produces nothing.
pub const GENERATION_FAILURE_ANSWER: &str = "Error generating answer. Please try again.";

/// Embedding, storage and answering, wired together once per process.
pub struct RetrievalPipeline {
    embeddings: Arc<EmbeddingService>,
    index: Arc<dyn VectorIndex>,
    answers: Arc<AnswerService>,
    default_options: QueryOptions,
}

impl RetrievalPipeline {
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        index: Arc<dyn VectorIndex>,
        answers: Arc<AnswerService>,
    ) -> Self {
        Self {
            embeddings,
            index,
            answers,
            default_options: QueryOptions::default(),
        }
    }

    pub fn with_default_options(mut self, options: QueryOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Build every component from configuration.
    ///
    /// # Errors
    /// Fails only when the index cannot be opened; provider problems leave the
    /// corresponding service unavailable instead.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let embeddings = EmbeddingService::from_config(config);
        let index = SqliteIndex::open(&config.persist_dir(), &config.store.collection)?;
        let answers = AnswerService::from_config(config).await;

        Ok(Self::new(Arc::new(embeddings), Arc::new(index), Arc::new(answers))
            .with_default_options(QueryOptions {
                top_k: config.retrieval.top_k,
                max_output_tokens: config.retrieval.max_output_tokens,
            }))
    }

    /// Options used when the caller does not override them.
    pub fn default_options(&self) -> QueryOptions {
        self.default_options
    }

    /// Embed and store chunks.
    ///
    /// Returns false, storing nothing, when `chunks` is empty, when
    /// `metadatas` has a different length, when embedding fails, or when
    /// the index rejects the batch.
    #[tracing::instrument(skip_all, fields(chunks = chunks.len()))]
    pub async fn ingest(&self, chunks: &[String], metadatas: Option<Vec<Metadata>>) -> bool {
        match AssertUnwindSafe(self.try_ingest(chunks, metadatas))
            .catch_unwind()
            .await
        {
            Ok(Ok(stored)) => stored,
            Ok(Err(e)) => {
                tracing::error!("Error adding documents: {}", e);
                false
            }
            Err(panic) => {
                tracing::error!("Ingestion panicked: {}", panic_message(panic.as_ref()));
                false
            }
        }
    }

    async fn try_ingest(&self, chunks: &[String], metadatas: Option<Vec<Metadata>>) -> AppResult<bool> {
        if chunks.is_empty() {
            tracing::warn!("No chunks to ingest");
            return Ok(false);
        }
        if let Some(metadatas) = &metadatas {
            if metadatas.len() != chunks.len() {
                return Err(AppError::Validation(format!(
                    "{} metadata entries for {} chunks",
                    metadatas.len(),
                    chunks.len()
                )));
            }
        }

        let vectors = self.embeddings.embed(chunks).await?;
        if vectors.is_empty() {
            tracing::warn!("Embedding produced no vectors");
            return Ok(false);
        }

        let existing = self.index.count();
        tracing::debug!("Index holds {} records before ingest", existing);

        let metadatas = metadatas.unwrap_or_else(|| {
            chunks
                .iter()
                .map(|chunk| {
                    let mut metadata = Metadata::new();
                    metadata.insert(
                        "text".to_string(),
                        json!(prefix_chars(chunk, METADATA_TEXT_CHARS)),
                    );
                    metadata
                })
                .collect()
        });

        let records: Vec<IndexedRecord> = chunks
            .iter()
            .zip(vectors)
            .zip(metadatas)
            .map(|((text, vector), metadata)| IndexedRecord {
                id: format!("doc_{}", uuid::Uuid::new_v4()),
                vector,
                text: text.clone(),
                metadata,
            })
            .collect();

        let stored = self.index.add(&records);
        if stored {
            tracing::info!("Added {} chunks to the knowledge base", records.len());
        }
        Ok(stored)
    }

    /// Answer a question from the stored passages.
    #[tracing::instrument(skip(self, question), fields(top_k = options.top_k))]
    pub async fn query(&self, question: &str, options: &QueryOptions) -> QueryResult {
        match AssertUnwindSafe(self.run_query(question, options))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!("Query panicked: {}", message);
                QueryResult::diagnostic(format!("An error occurred: {}", message), options.top_k)
            }
        }
    }

    async fn run_query(&self, question: &str, options: &QueryOptions) -> QueryResult {
        let top_k = options.top_k;

        // Validate
        if question.trim().is_empty() {
            return QueryResult::diagnostic(INVALID_QUESTION_ANSWER, top_k);
        }
        if top_k == 0 || options.max_output_tokens == 0 {
            return QueryResult::diagnostic(INVALID_OPTIONS_ANSWER, top_k);
        }

        // Embed
        let query_vector = match self.embeddings.embed_one(question).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!("Error generating query embedding: {}", e);
                return QueryResult::diagnostic(EMBEDDING_FAILURE_ANSWER, top_k);
            }
        };

        // Retrieve
        let results = self.index.search(&query_vector, top_k, None);
        if results.is_empty() {
            tracing::info!("No relevant documents found");
            return QueryResult::diagnostic(NO_DOCUMENTS_ANSWER, top_k);
        }

        tracing::debug!(
            "Retrieved {} passages (closest distance: {:?})",
            results.len(),
            results.first().and_then(|r| r.distance)
        );

        // Assemble
        let context = build_context(&results);
        let sources: Vec<SourcePassage> = results.iter().map(SourcePassage::from_result).collect();

        // Generate
        let answer = match self
            .answers
            .generate(question, &context, options.max_output_tokens)
            .await
        {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => {
                tracing::warn!("Answer backend returned an empty answer");
                GENERATION_FAILURE_ANSWER.to_string()
            }
            Err(e) => {
                tracing::warn!("Error generating answer: {}", e);
                GENERATION_FAILURE_ANSWER.to_string()
            }
        };

        QueryResult {
            answer,
            metadata: QueryMetadata {
                num_sources: sources.len(),
                top_k,
            },
            sources,
        }
    }

    /// Number of stored passages.
    pub fn document_count(&self) -> usize {
        self.index.count()
    }

    /// Vector length of the active embedding provider, 0 if none.
    pub fn embedding_dimension(&self) -> usize {
        self.embeddings.embedding_dimension()
    }

    /// Whether any answer backend is configured.
    pub fn answer_available(&self) -> bool {
        self.answers.is_available()
    }

    /// Name of the answer backend tried first.
    pub fn answer_backend(&self) -> Option<&str> {
        self.answers.active_backend()
    }

    /// Name of the active embedding provider.
    pub fn embedding_provider(&self) -> Option<&str> {
        self.embeddings.provider_name()
    }

    /// Remove every stored passage.
    pub fn clear(&self) -> bool {
        self.index.clear()
    }

    /// Remove passages by id.
    pub fn delete(&self, ids: &[String]) -> bool {
        self.index.delete(ids)
    }
}

/// One `[Source i]` block per ranked result, separated by blank lines.
fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| format!("[Source {}] {}", i + 1, result.document))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(document: &str) -> SearchResult {
        SearchResult {
            id: "doc_x".to_string(),
            document: document.to_string(),
            distance: Some(0.1),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_build_context() {
        let context = build_context(&[result("Alpha."), result("Beta.")]);
        assert_eq!(context, "[Source 1] Alpha.\n\n[Source 2] Beta.");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unexpected panic");
    }
}
