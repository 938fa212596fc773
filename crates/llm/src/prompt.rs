//! Answer prompt rendering.

use bookqa_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde_json::json;

/// Sentence the model is told to give when the context lacks the answer.
pub const NO_ANSWER_SENTENCE: &str =
    "I don't have enough information to answer this question based on the provided context.";

/// Marker that ends the prompt; generated text follows it.
pub const ANSWER_MARKER: &str = "Answer:";

const ANSWER_TEMPLATE: &str = "Based on the following context, answer the question.
If the answer is not in the context, say \"{{no_answer}}\"

Context:
{{context}}

Question: {{question}}

Answer:";

/// Render the answer prompt sent verbatim to every backend.
///
/// # Example
/// ```
/// use bookqa_llm::prompt::build_answer_prompt;
///
/// let prompt = build_answer_prompt("Who?", "[Source 1] Ada wrote it.").unwrap();
/// assert!(prompt.ends_with("Question: Who?\n\nAnswer:"));
/// ```
pub fn build_answer_prompt(question: &str, context: &str) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("answer", ANSWER_TEMPLATE)
        .map_err(|e| AppError::Other(format!("Failed to register template: {}", e)))?;

    handlebars
        .render(
            "answer",
            &json!({
                "no_answer": NO_ANSWER_SENTENCE,
                "context": context,
                "question": question,
            }),
        )
        .map_err(|e| AppError::Other(format!("Failed to render template: {}", e)))
}

/// Keep only the text after the final answer marker, trimmed.
///
/// Text without a marker is returned trimmed as-is.
pub fn strip_echoed_prompt(generated: &str) -> String {
    match generated.rfind(ANSWER_MARKER) {
        Some(pos) => generated[pos + ANSWER_MARKER.len()..].trim().to_string(),
        None => generated.trim().to_string(),
    }
}
