//! Overlapping character-window chunking of document pages.

use crate::config::ChunkingConfig;
use crate::document::{Document, SourceKind};
use serde::{Deserialize, Serialize};

/// Characters searched backwards from a window end for a sentence boundary.
const BOUNDARY_WINDOW: usize = 100;

/// A chunk of text with the location it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text content (trimmed).
    pub text: String,
    /// Store key of the source document.
    pub source: String,
    /// Page (or slide) number the chunk was cut from.
    pub page: usize,
    pub kind: SourceKind,
    /// Index of the chunk within its document.
    pub chunk_index: usize,
    /// Start character position in the page.
    pub start_pos: usize,
    /// End character position in the page (exclusive).
    pub end_pos: usize,
}

/// Splits page text into overlapping chunks.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

impl TextSplitter {
    /// Create a splitter. A zero chunk size is treated as one character.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split every page of a document; chunk indices run across pages.
    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in &document.pages {
            for (text, start_pos, end_pos) in self.split_text(&page.content) {
                chunks.push(Chunk {
                    text,
                    source: document.source.clone(),
                    page: page.number,
                    kind: document.kind,
                    chunk_index: chunks.len(),
                    start_pos,
                    end_pos,
                });
            }
        }

        chunks
    }

    /// Chunk text into overlapping segments as `(text, start, end)` char spans.
    pub fn split_text(&self, text: &str) -> Vec<(String, usize, usize)> {
        let mut pieces = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let text_len = chars.len();

        let mut start = 0;
        while start < text_len {
            let end = (start + self.chunk_size).min(text_len);

            // Try to break at a sentence boundary if the window is not the last one
            let adjusted_end = if end < text_len {
                let search_start = end.saturating_sub(BOUNDARY_WINDOW).max(start);
                chars[search_start..end]
                    .iter()
                    .rposition(|c| is_sentence_end(*c))
                    .map(|pos| search_start + pos + 1)
                    .filter(|candidate| *candidate > start)
                    .unwrap_or(end)
            } else {
                end
            };

            let final_end = adjusted_end.max(start + 1).min(text_len);
            let piece: String = chars[start..final_end].iter().collect();
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                pieces.push((trimmed.to_string(), start, final_end));
            }

            if final_end >= text_len {
                break;
            }

            let next_start = final_end.saturating_sub(self.chunk_overlap);

            // Always move forward by at least one character
            start = if next_start <= start {
                start + 1
            } else {
                next_start
            };
        }

        pieces
    }
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '！' | '？' | '；' | '\n')
}
