//! Recursive text splitting using the text-splitter crate.
//!
//! Splits prefer paragraph, then line, then sentence, then word, then
//! character boundaries, and consecutive chunks overlap by at most the
//! configured number of characters.

use crate::types::{Chunk, Metadata};
use bookqa_core::config::RetrievalConfig;
use bookqa_core::{AppError, AppResult};
use serde_json::json;
use text_splitter::{Characters, ChunkConfig, TextSplitter};

/// Character-based chunker with fixed size and overlap.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    splitter: TextSplitter<Characters>,
}

impl TextChunker {
    /// Create a chunker.
    ///
    /// # Errors
    /// * `AppError::Config` - zero chunk size, or overlap not smaller than chunk size
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::Config("chunk size must be at least 1".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }

        let config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunk configuration: {}", e)))?;

        Ok(Self {
            chunk_size,
            chunk_overlap,
            splitter: TextSplitter::new(config),
        })
    }

    /// Create a chunker from the retrieval settings.
    pub fn from_config(config: &RetrievalConfig) -> AppResult<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into chunks. Blank input gives no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chunks: Vec<String> = self
            .splitter
            .chunks(text)
            .filter(|chunk| !chunk.trim().is_empty())
            .map(str::to_string)
            .collect();

        tracing::debug!(
            "Text splitter created {} chunks from {} bytes",
            chunks.len(),
            text.len()
        );

        chunks
    }

    /// Split several documents, tagging each chunk with `document_id`,
    /// `chunk_id` and `chunk_size` (characters).
    pub fn chunk_documents(&self, documents: &[String]) -> Vec<Chunk> {
        documents
            .iter()
            .enumerate()
            .flat_map(|(document_id, document)| {
                self.split(document)
                    .into_iter()
                    .enumerate()
                    .map(move |(chunk_id, text)| {
                        let mut metadata = Metadata::new();
                        metadata.insert("document_id".to_string(), json!(document_id));
                        metadata.insert("chunk_id".to_string(), json!(chunk_id));
                        metadata.insert("chunk_size".to_string(), json!(text.chars().count()));
                        Chunk::new(text).with_metadata(metadata)
                    })
            })
            .collect()
    }
}

/// Split `text` with a one-off chunker.
pub fn split(text: &str, max_chunk_chars: usize, overlap_chars: usize) -> AppResult<Vec<String>> {
    Ok(TextChunker::new(max_chunk_chars, overlap_chars)?.split(text))
}

/// Rough token count: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{:03}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_blank_input_gives_no_chunks() {
        assert!(split("", 100, 10).unwrap().is_empty());
        assert!(split("  \n\n ", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = split("Paris is the capital of France.", 1000, 200).unwrap();
        assert_eq!(chunks, vec!["Paris is the capital of France."]);
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = "This is a test. ".repeat(100);
        let chunks = split(&text, 100, 20).unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = numbered_words(200);
        let chunks = split(&text, 100, 30).unwrap();
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let first_word = pair[1].split_whitespace().next().unwrap();
            assert!(
                pair[0].contains(first_word),
                "chunk {:?} does not overlap {:?}",
                pair[1],
                pair[0]
            );
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let first = "First paragraph sentence one. Sentence two.";
        let second = "Second paragraph is here.";
        let text = format!("{}\n\n{}", first, second);
        let chunks = split(&text, 50, 0).unwrap();
        assert_eq!(chunks, vec![first, second]);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        assert!(matches!(TextChunker::new(100, 100), Err(AppError::Config(_))));
        assert!(matches!(TextChunker::new(100, 150), Err(AppError::Config(_))));
        assert!(matches!(TextChunker::new(0, 0), Err(AppError::Config(_))));
    }

    #[test]
    fn test_chunk_documents_metadata() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        let docs = vec!["Alpha document.".to_string(), "Beta document.".to_string()];

        let chunks = chunker.chunk_documents(&docs);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "Beta document.");
        assert_eq!(chunks[1].metadata["document_id"], json!(1));
        assert_eq!(chunks[1].metadata["chunk_id"], json!(0));
        assert_eq!(chunks[1].metadata["chunk_size"], json!(14));
    }

    #[test]
    fn test_utf8_text() {
        let text = "Gamedex é um aplicativo 🎮 com acentuação: ã, õ, ç. ".repeat(50);
        let chunks = split(&text, 120, 20).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 120));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("abc"), 0);
    }
}
