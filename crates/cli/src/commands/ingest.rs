//! Ingest command handler.
//!
//! Extracts text from PDFs, splits it into chunks and stores them in the
//! knowledge base in a single batch.

use super::print_json;
use bookqa_core::{config::AppConfig, AppError, AppResult};
use bookqa_knowledge::pdf::{extract_text, validate_pdf};
use bookqa_knowledge::{Chunk, Metadata, RetrievalPipeline, TextChunker};
use clap::Args;
use serde_json::json;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Add PDF documents to the knowledge base
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// PDF files, or directories to search for PDFs
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Maximum characters per chunk (default: from config)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks (default: from config)
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Outcome for one input file.
#[derive(Debug)]
struct FileReport {
    path: PathBuf,
    chunks: usize,
    skipped: Option<String>,
}

impl IngestCommand {
    pub async fn execute(&self, pipeline: &RetrievalPipeline, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        let chunker = TextChunker::new(
            self.chunk_size.unwrap_or(config.retrieval.chunk_size),
            self.chunk_overlap.unwrap_or(config.retrieval.chunk_overlap),
        )?;

        let files = collect_pdfs(&self.paths);
        if files.is_empty() {
            return Err(AppError::Validation("No PDF files found".to_string()));
        }

        let mut documents = Vec::new();
        let mut sources = Vec::new();
        let mut document_reports = Vec::new();
        let mut reports = Vec::with_capacity(files.len());

        for path in files {
            match read_text(&path).await {
                Ok(text) => {
                    documents.push(text);
                    sources.push(file_name(&path));
                    document_reports.push(reports.len());
                    reports.push(FileReport {
                        path,
                        chunks: 0,
                        skipped: None,
                    });
                }
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {}", path, e);
                    reports.push(FileReport {
                        path,
                        chunks: 0,
                        skipped: Some(e.to_string()),
                    });
                }
            }
        }

        let (chunks, metadatas, per_document) =
            tag_sources(chunker.chunk_documents(&documents), &sources);
        for (document_id, count) in per_document.into_iter().enumerate() {
            if let Some(report) = document_reports
                .get(document_id)
                .and_then(|&i| reports.get_mut(i))
            {
                report.chunks = count;
            }
        }

        if chunks.is_empty() {
            return Err(AppError::Validation(
                "No text could be extracted from the given PDFs".to_string(),
            ));
        }

        let total = chunks.len();
        if !pipeline.ingest(&chunks, Some(metadatas)).await {
            return Err(AppError::Index(
                "Failed to add documents to the knowledge base".to_string(),
            ));
        }

        if self.json {
            let files: Vec<_> = reports
                .iter()
                .map(|r| {
                    json!({
                        "path": r.path.display().to_string(),
                        "chunks": r.chunks,
                        "skipped": r.skipped,
                    })
                })
                .collect();
            print_json(&json!({
                "files": files,
                "chunksAdded": total,
                "documentCount": pipeline.document_count(),
            }))?;
        } else {
            for report in &reports {
                match &report.skipped {
                    None => println!("{}: {} chunks", report.path.display(), report.chunks),
                    Some(reason) => println!("{}: skipped ({})", report.path.display(), reason),
                }
            }
            println!(
                "Added {} chunks. The knowledge base now holds {} passages.",
                total,
                pipeline.document_count()
            );
        }

        Ok(())
    }
}

/// Read one PDF and extract its text.
async fn read_text(path: &Path) -> AppResult<String> {
    let bytes = tokio::fs::read(path).await?;
    if !validate_pdf(&bytes) {
        return Err(AppError::Validation("not a readable PDF".to_string()));
    }

    let text = extract_text(&bytes)?
        .ok_or_else(|| AppError::Validation("no extractable text".to_string()))?;
    tracing::debug!("Extracted {} characters from {:?}", text.chars().count(), path);
    Ok(text)
}

/// Add `source` and `chunk_index` to chunks produced by
/// [`TextChunker::chunk_documents`], where `sources[i]` names document `i`.
///
/// Returns the chunk texts, their metadata and the chunk count per document.
fn tag_sources(chunks: Vec<Chunk>, sources: &[String]) -> (Vec<String>, Vec<Metadata>, Vec<usize>) {
    let mut per_document = vec![0; sources.len()];
    let mut texts = Vec::with_capacity(chunks.len());
    let mut metadatas = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let mut metadata = chunk.metadata;
        let document_id = metadata
            .get("document_id")
            .and_then(|v| v.as_u64())
            .map(|id| id as usize);

        if let Some(id) = document_id {
            if let Some(source) = sources.get(id) {
                metadata.insert("source".to_string(), json!(source));
            }
            if let Some(count) = per_document.get_mut(id) {
                *count += 1;
            }
        }
        if let Some(chunk_id) = metadata.get("chunk_id").cloned() {
            metadata.insert("chunk_index".to_string(), chunk_id);
        }

        texts.push(chunk.text);
        metadatas.push(metadata);
    }

    (texts, metadatas, per_document)
}

/// Expand the given paths into PDF files, sorted within each directory.
fn collect_pdfs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file() && is_pdf(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            // Explicit files are taken as given and rejected later if unreadable
            files.push(path.clone());
        }
    }

    files
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_pdfs_walks_directories() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join("b.pdf"), b"x").unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(nested.join("a.PDF"), b"x").unwrap();

        let files = collect_pdfs(&[temp.path().to_path_buf()]);
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| is_pdf(f)));
    }

    #[test]
    fn test_explicit_files_are_kept() {
        let files = collect_pdfs(&[PathBuf::from("missing.pdf")]);
        assert_eq!(files, vec![PathBuf::from("missing.pdf")]);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/books/atlas.pdf")), "atlas.pdf");
    }

    #[tokio::test]
    async fn test_read_text_rejects_non_pdf() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fake.pdf");
        std::fs::write(&path, b"plain text").unwrap();

        let result = read_text(&path).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_tag_sources_names_each_chunk() {
        let chunker = TextChunker::new(40, 0).unwrap();
        let documents = vec![
            "Paris is the capital of France.\n\nLyon is known for its food.".to_string(),
            "Tokyo is the capital of Japan.".to_string(),
        ];
        let sources = vec!["france.pdf".to_string(), "japan.pdf".to_string()];

        let (texts, metadatas, per_document) =
            tag_sources(chunker.chunk_documents(&documents), &sources);

        assert_eq!(per_document, vec![2, 1]);
        assert_eq!(texts.len(), 3);
        assert_eq!(metadatas.len(), 3);

        assert_eq!(texts[0], "Paris is the capital of France.");
        assert_eq!(metadatas[0]["source"], json!("france.pdf"));
        assert_eq!(metadatas[0]["chunk_index"], json!(0));
        assert_eq!(metadatas[1]["source"], json!("france.pdf"));
        assert_eq!(metadatas[1]["chunk_index"], json!(1));
        assert_eq!(metadatas[2]["source"], json!("japan.pdf"));
        assert_eq!(metadatas[2]["chunk_index"], json!(0));
        assert_eq!(metadatas[2]["document_id"], json!(1));
    }
}
