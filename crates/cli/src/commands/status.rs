//! Status command handler.

use super::print_json;
use bookqa_core::{config::AppConfig, AppResult};
use bookqa_knowledge::RetrievalPipeline;
use clap::Args;
use serde_json::json;

/// Show knowledge base and provider status
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, pipeline: &RetrievalPipeline, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing status command");

        let persist_dir = config.persist_dir();

        if self.json {
            print_json(&json!({
                "documentCount": pipeline.document_count(),
                "embeddingProvider": pipeline.embedding_provider(),
                "embeddingDimension": pipeline.embedding_dimension(),
                "llmAvailable": pipeline.answer_available(),
                "llmBackend": pipeline.answer_backend(),
                "mode": config.provider_mode().as_str(),
                "persistDir": persist_dir.display().to_string(),
                "collection": config.store.collection,
            }))?;
        } else {
            println!("Knowledge base: {}", config.store.collection);
            println!("  Documents: {}", pipeline.document_count());
            println!("  Persist dir: {}", persist_dir.display());
            println!(
                "  Embeddings: {} ({} dimensions)",
                pipeline.embedding_provider().unwrap_or("unavailable"),
                pipeline.embedding_dimension()
            );
            match pipeline.answer_backend() {
                Some(backend) => println!("  LLM: available ({})", backend),
                None => println!("  LLM: unavailable"),
            }
            println!("  Mode: {}", config.provider_mode().as_str());
        }

        Ok(())
    }
}
