//! Command handlers for the BookQA CLI.
//!
//! Every handler receives the shared `RetrievalPipeline` built in `main`.

pub mod ask;
pub mod clear;
pub mod ingest;
pub mod status;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use clear::ClearCommand;
pub use ingest::IngestCommand;
pub use status::StatusCommand;

use bookqa_core::{AppError, AppResult};

/// Print a JSON value to stdout.
pub(crate) fn print_json(value: &serde_json::Value) -> AppResult<()> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(format!("JSON serialization failed: {}", e)))?;
    println!("{}", output);
    Ok(())
}
