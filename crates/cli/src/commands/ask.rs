//! Ask command handler.
//!
//! Answers a question from the knowledge base and lists the passages used.

use super::print_json;
use bookqa_core::{AppError, AppResult};
use bookqa_knowledge::{QueryOptions, QueryResult, RetrievalPipeline};
use clap::Args;

/// Ask a question about the ingested documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of passages to retrieve (default: from config)
    #[arg(
        short = 'k',
        long,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub top_k: Option<usize>,

    /// Maximum tokens in the answer (default: from config)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_tokens: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, pipeline: &RetrievalPipeline) -> AppResult<()> {
        tracing::info!("Executing ask command");

        if pipeline.document_count() == 0 {
            tracing::warn!("Knowledge base is empty");
            println!("The knowledge base is empty. Run `bookqa ingest <pdf>` first.");
            return Ok(());
        }

        let options = self.options(pipeline.default_options());
        let result = pipeline.query(&self.question, &options).await;

        if self.json {
            let value = serde_json::to_value(&result)
                .map_err(|e| AppError::Serialization(format!("JSON serialization failed: {}", e)))?;
            print_json(&value)?;
        } else {
            print_result(&result);
        }

        Ok(())
    }

    /// Merge flags over the configured defaults.
    fn options(&self, defaults: QueryOptions) -> QueryOptions {
        QueryOptions {
            top_k: self.top_k.unwrap_or(defaults.top_k),
            max_output_tokens: self.max_tokens.unwrap_or(defaults.max_output_tokens),
        }
    }
}

fn print_result(result: &QueryResult) {
    println!("Answer:");
    println!("{}", result.answer);
    println!();

    if result.sources.is_empty() {
        println!("Sources: (no sources available)");
        return;
    }

    println!("Sources:");
    for (i, source) in result.sources.iter().enumerate() {
        let origin = source
            .metadata
            .get("source")
            .and_then(|v| v.as_str())
            .map(|name| format!(" {}", name))
            .unwrap_or_default();
        println!(
            "[{}]{} ({})",
            i + 1,
            origin,
            similarity_percent(source.similarity)
        );
        println!("    {}", source.text);
    }
}

/// Similarity as a whole-number percentage.
fn similarity_percent(similarity: f32) -> String {
    format!("{:.0}%", similarity * 100.0)
}
