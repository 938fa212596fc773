//! Clear command handler.

use bookqa_core::{AppError, AppResult};
use bookqa_knowledge::RetrievalPipeline;
use clap::Args;

/// Remove every document from the knowledge base
#[derive(Args, Debug)]
pub struct ClearCommand {
    /// Confirm the deletion
    #[arg(long)]
    pub yes: bool,
}

impl ClearCommand {
    pub async fn execute(&self, pipeline: &RetrievalPipeline) -> AppResult<()> {
        if !self.yes {
            return Err(AppError::Validation(
                "Refusing to clear the knowledge base without --yes".to_string(),
            ));
        }

        tracing::info!("Executing clear command");
        let removed = pipeline.document_count();

        if !pipeline.clear() {
            return Err(AppError::Index("Failed to clear the knowledge base".to_string()));
        }

        println!("Knowledge base cleared ({} passages removed)", removed);
        Ok(())
    }
}
