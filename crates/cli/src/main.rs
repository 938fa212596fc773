//! BookQA CLI
//!
//! Main entry point for the bookqa command-line tool.
//! Ingests PDFs into a local knowledge base and answers questions about them.

mod commands;

use bookqa_core::{config::AppConfig, logging, AppResult};
use bookqa_knowledge::RetrievalPipeline;
use clap::{Parser, Subcommand};
use commands::{AskCommand, ClearCommand, IngestCommand, StatusCommand};
use std::path::PathBuf;

/// BookQA - ask questions about your PDF documents
#[derive(Parser, Debug)]
#[command(name = "bookqa")]
#[command(about = "Ask questions about your PDF documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "BOOKQA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "BOOKQA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add PDF documents to the knowledge base
    Ingest(IngestCommand),

    /// Ask a question about the ingested documents
    Ask(AskCommand),

    /// Show knowledge base and provider status
    Status(StatusCommand),

    /// Remove every document from the knowledge base
    Clear(ClearCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, config file and environment, then CLI overrides
    let config = AppConfig::load_from(cli.workspace, cli.config)?.with_overrides(
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.json_logs,
    );
    config.validate()?;

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("BookQA CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider mode: {}", config.provider_mode().as_str());

    config.ensure_persist_dir()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Status(_) => "status",
        Commands::Clear(_) => "clear",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Built once and shared by every command
    let pipeline = RetrievalPipeline::from_config(&config).await?;

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&pipeline, &config).await,
        Commands::Ask(cmd) => cmd.execute(&pipeline).await,
        Commands::Status(cmd) => cmd.execute(&pipeline, &config).await,
        Commands::Clear(cmd) => cmd.execute(&pipeline).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
