//! In-process extractive answer model.
//!
//! Needs no server and no weights: it reads the context and question back out
//! of the answer prompt and continues the prompt with the context sentences
//! that share the most content words with the question. Like small local
//! generative models, its output echoes the prompt.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::prompt::NO_ANSWER_SENTENCE;
use bookqa_core::AppResult;
use std::collections::HashSet;

/// Words generated when the request sets no limit.
const DEFAULT_MAX_WORDS: u32 = 256;

/// Upper bound on sentences quoted in one answer.
const MAX_SENTENCES: usize = 3;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "has",
    "have", "how", "in", "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was",
    "were", "what", "when", "where", "which", "who", "why", "with",
];

/// Extractive answer backend.
#[derive(Debug, Default, Clone)]
pub struct ExtractiveClient;

impl ExtractiveClient {
    pub fn new() -> Self {
        Self
    }

    /// Pick the best-matching context sentences for the question.
    fn select_sentences(context: &str, question: &str) -> Vec<String> {
        let question_terms = content_terms(question);
        if question_terms.is_empty() {
            return Vec::new();
        }

        let scored: Vec<(usize, String)> = split_sentences(context)
            .into_iter()
            .map(|sentence| {
                let overlap = content_terms(&sentence)
                    .intersection(&question_terms)
                    .count();
                (overlap, sentence)
            })
            .filter(|(overlap, _)| *overlap > 0)
            .collect();

        let best = match scored.iter().map(|(overlap, _)| *overlap).max() {
            Some(best) => best,
            None => return Vec::new(),
        };

        // Ties keep context order, which is rank order
        scored
            .into_iter()
            .filter(|(overlap, _)| *overlap == best)
            .map(|(_, sentence)| sentence)
            .take(MAX_SENTENCES)
            .collect()
    }
}

#[async_trait::async_trait]
impl LlmClient for ExtractiveClient {
    fn provider_name(&self) -> &str {
        "extractive"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let (context, question) = parse_prompt(&request.prompt);
        let sentences = Self::select_sentences(context, question);

        let continuation = if sentences.is_empty() {
            NO_ANSWER_SENTENCE.to_string()
        } else {
            sentences.join(" ")
        };

        let max_words = request.max_tokens.unwrap_or(DEFAULT_MAX_WORDS) as usize;
        let continuation: Vec<&str> = continuation.split_whitespace().take(max_words).collect();
        let prompt_words = request.prompt.split_whitespace().count();

        tracing::debug!(
            sentences = sentences.len(),
            words = continuation.len(),
            "Extractive answer assembled"
        );

        Ok(LlmResponse {
            content: format!("{} {}", request.prompt, continuation.join(" ")),
            model: request.model.clone(),
            usage: LlmUsage::new(prompt_words as u32, continuation.len() as u32),
        })
    }

    fn echoes_prompt(&self) -> bool {
        true
    }
}

/// Pull the context and question sections out of a rendered answer prompt.
///
/// A prompt without the expected sections is treated as a bare question.
fn parse_prompt(prompt: &str) -> (&str, &str) {
    let context_start = prompt.find("Context:\n").map(|i| i + "Context:\n".len());
    let question_start = prompt.rfind("\nQuestion: ");

    match (context_start, question_start) {
        (Some(c), Some(q)) if c <= q => {
            let question = &prompt[q + "\nQuestion: ".len()..];
            let question = question.split("\n\nAnswer:").next().unwrap_or(question);
            (prompt[c..q].trim(), question.trim())
        }
        _ => ("", prompt.trim()),
    }
}

/// Split text into sentences, dropping `[Source N]` labels.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for line in text.lines() {
        let line = strip_source_label(line.trim());
        let mut current = String::new();
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);
            let at_boundary = matches!(c, '.' | '!' | '?')
                && chars.peek().map_or(true, |next| next.is_whitespace());
            if at_boundary {
                push_sentence(&mut sentences, &current);
                current.clear();
            }
        }
        push_sentence(&mut sentences, &current);
    }

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

fn strip_source_label(line: &str) -> &str {
    if line.starts_with("[Source ") {
        if let Some(end) = line.find(']') {
            return line[end + 1..].trim_start();
        }
    }
    line
}

/// Lowercased content words, without stop words.
fn content_terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{build_answer_prompt, strip_echoed_prompt};

    #[test]
    fn test_parse_prompt_sections() {
        let prompt = build_answer_prompt("Who wrote it?", "[Source 1] Ada wrote it.").unwrap();
        let (context, question) = parse_prompt(&prompt);
        assert_eq!(context, "[Source 1] Ada wrote it.");
        assert_eq!(question, "Who wrote it?");
    }

    #[test]
    fn test_split_sentences_drops_labels() {
        let sentences = split_sentences(
            "[Source 1] Paris is the capital of France. It is large!\n\n[Source 2] Version 1.5 shipped",
        );
        assert_eq!(
            sentences,
            vec![
                "Paris is the capital of France.",
                "It is large!",
                "Version 1.5 shipped",
            ]
        );
    }

    #[tokio::test]
    async fn test_answers_with_best_sentence() {
        let context = "[Source 1] Paris is the capital of France.\n\n[Source 2] Tokyo is the capital of Japan.";
        let prompt = build_answer_prompt("What is the capital of France?", context).unwrap();

        let client = ExtractiveClient::new();
        let response = client
            .complete(&LlmRequest::new(&prompt, "extractive").with_max_tokens(50))
            .await
            .unwrap();

        assert!(client.echoes_prompt());
        assert!(response.content.starts_with(&prompt));
        assert_eq!(
            strip_echoed_prompt(&response.content),
            "Paris is the capital of France."
        );
    }

    #[tokio::test]
    async fn test_no_overlap_gives_no_answer_sentence() {
        let prompt = build_answer_prompt("Who painted Guernica?", "[Source 1] Rust has traits.")
            .unwrap();
        let response = ExtractiveClient::new()
            .complete(&LlmRequest::new(&prompt, "extractive"))
            .await
            .unwrap();
        assert_eq!(strip_echoed_prompt(&response.content), NO_ANSWER_SENTENCE);
    }

    #[tokio::test]
    async fn test_output_bounded_by_prompt_plus_max_words() {
        let context = "[Source 1] Rust ownership rules keep memory safe without a garbage collector at runtime.";
        let prompt = build_answer_prompt("How does Rust keep memory safe?", context).unwrap();
        let response = ExtractiveClient::new()
            .complete(&LlmRequest::new(&prompt, "extractive").with_max_tokens(3))
            .await
            .unwrap();

        let prompt_words = prompt.split_whitespace().count();
        assert_eq!(response.content.split_whitespace().count(), prompt_words + 3);
        assert_eq!(strip_echoed_prompt(&response.content), "Rust ownership rules");
    }
}
