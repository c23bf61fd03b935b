//! PDF text extraction.
//!
//! `pdf-extract` handles font encodings best but can fail or panic on
//! malformed files; `lopdf` is the fallback and walks the text-showing
//! operators of each page's content stream.

use crate::error::{RagError, Result};
use lopdf::Object;
use std::path::Path;
use tracing::{debug, warn};

/// Extract one string per physical page.
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let primary = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));

    let reason = match primary {
        Ok(Ok(pages)) => {
            debug!(path = %path.display(), pages = pages.len(), "extracted PDF with pdf-extract");
            return Ok(pages);
        }
        Ok(Err(e)) => e.to_string(),
        Err(payload) => panic_message(payload),
    };

    warn!(path = %path.display(), %reason, "pdf-extract failed, trying lopdf fallback");
    extract_pages_via_lopdf(path)
        .map_err(|fallback| RagError::extraction(path, format!("{reason}; fallback: {fallback}")))
}

/// Fallback extraction using lopdf's content stream decoder.
fn extract_pages_via_lopdf(path: &Path) -> std::result::Result<Vec<String>, String> {
    let doc = lopdf::Document::load(path).map_err(|e| format!("Failed to load PDF: {}", e))?;

    let mut pages = Vec::new();
    for (_page_num, page_id) in doc.get_pages() {
        let mut text = String::new();

        if let Ok(content) = doc.get_page_content(page_id) {
            let operations = lopdf::content::Content::decode(&content)
                .map(|c| c.operations)
                .unwrap_or_default();

            for op in operations {
                match op.operator.as_str() {
                    "Tj" | "'" | "\"" => {
                        if let Some(Object::String(bytes, _)) = op.operands.last() {
                            text.push_str(&decode_pdf_string(bytes));
                        }
                    }
                    "TJ" => {
                        if let Some(Object::Array(items)) = op.operands.first() {
                            for item in items {
                                if let Object::String(bytes, _) = item {
                                    text.push_str(&decode_pdf_string(bytes));
                                }
                            }
                        }
                    }
                    "Td" | "TD" | "T*" => {
                        if !text.ends_with('\n') && !text.ends_with(' ') {
                            text.push(' ');
                        }
                    }
                    "ET" => {
                        if !text.ends_with('\n') {
                            text.push('\n');
                        }
                    }
                    _ => {}
                }
            }
        }

        pages.push(text);
    }

    Ok(pages)
}

/// Decode a PDF string: UTF-16BE with BOM, then UTF-8, then Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pdf-extract panicked".to_string()
    }
}
