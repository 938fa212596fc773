//! PDF text extraction using lopdf.

use bookqa_core::{AppError, AppResult};
use lopdf::Document;

/// Extract the text of every page.
///
/// Pages are joined as `--- Page N ---\n<text>` blocks separated by a blank
/// line. A page that fails to extract is skipped with a warning, and pages
/// without text are left out.
///
/// # Returns
/// * `Ok(Some(text))` - at least one page produced text
/// * `Ok(None)` - the document has no extractable text
///
/// # Errors
/// * `AppError::Validation` - the bytes are not a readable PDF
pub fn extract_text(bytes: &[u8]) -> AppResult<Option<String>> {
    let document = load(bytes)?;
    let pages = document.get_pages();

    let mut blocks = Vec::with_capacity(pages.len());
    for (position, page_number) in pages.keys().enumerate() {
        let label = position + 1;
        match document.extract_text(&[*page_number]) {
            Ok(text) if !text.trim().is_empty() => {
                blocks.push(format!("--- Page {} ---\n{}", label, text));
            }
            Ok(_) => tracing::debug!("Page {} has no text", label),
            Err(e) => tracing::warn!("Error extracting text from page {}: {}", label, e),
        }
    }

    if blocks.is_empty() {
        tracing::warn!("No text could be extracted from the PDF");
        return Ok(None);
    }

    tracing::debug!("Extracted text from {} of {} pages", blocks.len(), pages.len());
    Ok(Some(blocks.join("\n\n")))
}

/// Whether the bytes are a readable PDF with at least one page.
pub fn validate_pdf(bytes: &[u8]) -> bool {
    load(bytes)
        .map(|document| !document.get_pages().is_empty())
        .unwrap_or(false)
}

fn load(bytes: &[u8]) -> AppResult<Document> {
    Document::load_mem(bytes)
        .map_err(|e| AppError::Validation(format!("Error reading PDF file: {}", e)))
}
