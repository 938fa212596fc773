//! Trigram embedding provider using character trigram-based content-aware embeddings.

use crate::embeddings::provider::EmbeddingProvider;
use bookqa_core::AppResult;
use std::collections::HashMap;

/// Words carrying no topical signal, including question words so a
/// question embeds close to the statement that answers it.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "who", "how", "where", "when",
];

/// Trigram-based embedding provider for local, offline operation.
///
/// Generates deterministic embeddings based on text content using
/// character trigrams and word frequencies. While not semantically
/// accurate like neural embedding models, it produces consistent,
/// content-dependent vectors suitable for offline use.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Lowercased content words with surrounding punctuation removed.
    fn content_words(text: &str) -> HashMap<String, u32> {
        let mut word_freq = HashMap::new();
        for raw in text.split_whitespace() {
            let word = raw
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.chars().count() > 2 && !STOP_WORDS.contains(&word.as_str()) {
                *word_freq.entry(word).or_insert(0) += 1;
            }
        }
        word_freq
    }

    /// Generate a trigram-based embedding for text.
    fn generate_trigram_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];

        for (word, freq) in Self::content_words(text) {
            // Character trigrams spread each word over several dimensions
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram_hash = window.iter().collect::<String>().bytes().fold(0u64, |acc, b| {
                    acc.wrapping_mul(37).wrapping_add(b as u64)
                });
                let dim_idx = (trigram_hash as usize) % self.dimensions;
                embedding[dim_idx] += (freq as f32).sqrt();
            }

            // Whole word
            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            let base_dim = (word_hash as usize) % self.dimensions;
            embedding[base_dim] += freq as f32;
        }

        // Normalize to unit vector
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| self.generate_trigram_embedding(text))
            .collect())
    }
}
