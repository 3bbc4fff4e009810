//! Bulletin text extraction.
//!
//! Decodes the PDF page by page and joins the page texts in page order.
//! Any decoding failure is reported as [`AppError::DocumentCorrupt`]; a
//! partially readable bulletin is never passed on as if it were complete.

use lopdf::Document;

use crate::error::{AppError, Result};

/// Plain text of a PDF, pages separated by line breaks.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    if bytes.is_empty() {
        return Err(AppError::corrupt("empty document"));
    }

    let document = Document::load_mem(bytes).map_err(AppError::corrupt)?;
    if document.is_encrypted() {
        return Err(AppError::corrupt("document is encrypted"));
    }

    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(AppError::corrupt("document has no pages"));
    }

    let mut text = String::new();
    // BTreeMap keys are page numbers, so iteration is page order.
    for page_number in pages.keys() {
        let page_text = document
            .extract_text(&[*page_number])
            .map_err(|e| AppError::corrupt(format!("page {page_number}: {e}")))?;
        text.push_str(&page_text);
        if !text.ends_with('\n') {
            text.push('\n');
        }
    }

    log::debug!("Extracted {} characters from {} pages", text.len(), pages.len());
    Ok(text)
}
