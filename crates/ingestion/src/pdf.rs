//! PDF validation and per-page text extraction
//!
//! Pages are the unit of retrieval, so extraction keeps page boundaries
//! instead of flattening the document to one string.

use crate::errors::IngestionError;
use std::path::Path;
use tracing::{debug, warn};

/// Extracted text of one page, 1-indexed
#[derive(Debug, Clone)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// Whether the bytes carry the PDF magic header
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Extract text per page; a page that fails extraction yields empty text
pub fn extract_pages(path: &Path) -> Result<Vec<PageText>, IngestionError> {
    let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParse {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut out = Vec::with_capacity(pages.len());
    for &page_no in pages.keys() {
        let text = match doc.extract_text(&[page_no]) {
            Ok(raw) => clean_text(&raw),
            Err(e) => {
                warn!(page = page_no, error = %e, "Failed to extract text from page, skipping");
                String::new()
            }
        };
        out.push(PageText {
            page: page_no,
            text,
        });
    }

    Ok(out)
}

/// Clean extracted text
fn clean_text(text: &str) -> String {
    text
        // Replace runs of whitespace with single spaces
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        // Remove BOM artifacts
        .replace('\u{FEFF}', "")
}
