//! Document representation for ingestion.
//!
//! Documents are represented as a collection of pages, where each page
//! has content and a page number. For slide decks a page is one slide;
//! for plain text the entire content is a single page unless it
//! contains form feeds.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The kind of file a document was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Pptx,
    Docx,
    Text,
}

impl SourceKind {
    /// Detect the kind from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(SourceKind::Pdf),
            "pptx" => Some(SourceKind::Pptx),
            "docx" => Some(SourceKind::Docx),
            "txt" | "md" => Some(SourceKind::Text),
            _ => None,
        }
    }

    /// What a page is called in citations.
    pub fn location_label(&self) -> &'static str {
        match self {
            SourceKind::Pptx => "slide",
            _ => "page",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Pptx => "pptx",
            SourceKind::Docx => "docx",
            SourceKind::Text => "text",
        };
        f.write_str(s)
    }
}

/// A single page in a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// 1-indexed page number.
    pub number: usize,
    /// Text content of the page.
    pub content: String,
    /// Approximate token count (words / 0.75).
    pub token_count: usize,
}

impl Page {
    /// Create a new page.
    pub fn new(number: usize, content: String) -> Self {
        let token_count = estimate_tokens(&content);
        Self {
            number,
            content,
            token_count,
        }
    }
}

/// A document consisting of one or more pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// File name including extension, used in citations.
    pub name: String,
    /// Key of the document in the store. The file name unless the document
    /// was loaded under an ingest root, then its `/`-joined relative path.
    pub source: String,
    /// Original file path (if loaded from file).
    pub path: Option<PathBuf>,
    /// Format the text came from.
    pub kind: SourceKind,
    /// Pages in the document.
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a new document with given name and pages.
    pub fn new(name: impl Into<String>, kind: SourceKind, pages: Vec<Page>) -> Self {
        let name = name.into();
        Self {
            source: name.clone(),
            name,
            path: None,
            kind,
            pages,
        }
    }

    /// Create a document from raw text content.
    pub fn from_text(name: impl Into<String>, content: String) -> Self {
        Self::new(name, SourceKind::Text, vec![Page::new(1, content)])
    }

    /// Build a document from per-page texts, numbering pages from 1 and
    /// dropping pages that are blank.
    pub fn from_page_texts(path: &Path, kind: SourceKind, texts: Vec<String>) -> Self {
        let pages = texts
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| Page::new(i + 1, text))
            .collect();

        let name = display_name(path);
        Self {
            source: name.clone(),
            name,
            path: Some(path.to_path_buf()),
            kind,
            pages,
        }
    }

    /// Key the document by its path below `root`.
    pub fn with_source_root(mut self, root: &Path) -> Self {
        if let Some(path) = &self.path {
            self.source = source_key(path, root);
        }
        self
    }

    /// Get total number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Get total token count across all pages.
    pub fn total_tokens(&self) -> usize {
        self.pages.iter().map(|p| p.token_count).sum()
    }

    /// Get a page by its number.
    pub fn get_page(&self, number: usize) -> Option<&Page> {
        self.pages.iter().find(|p| p.number == number)
    }

    /// True if no page has any non-whitespace text.
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.content.trim().is_empty())
    }

    /// Get raw content of all pages.
    pub fn raw_content(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// File name used to cite a document.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}

/// `path` relative to `root` with `/` separators, or the file name when
/// `path` is not below `root`.
pub fn source_key(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) if relative.components().next().is_some() => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        _ => display_name(path),
    }
}

/// The file name part of a source key.
pub fn source_file_name(source: &str) -> &str {
    source.rsplit('/').next().unwrap_or(source)
}

/// Estimate token count from text (rough approximation: words / 0.75).
///
/// Text without spaces (CJK) counts one token per character.
fn estimate_tokens(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    let cjk_count = text.chars().filter(|c| is_cjk(*c)).count();
    (word_count as f64 / 0.75) as usize + cjk_count
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_creation() {
        let page = Page::new(1, "Hello world, this is a test.".to_string());
        assert_eq!(page.number, 1);
        assert!(!page.content.is_empty());
        assert!(page.token_count > 0);
    }

    #[test]
    fn test_document_from_text() {
        let doc = Document::from_text("notes.txt", "This is the content.".to_string());
        assert_eq!(doc.name, "notes.txt");
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.kind, SourceKind::Text);
        assert!(doc.path.is_none());
    }

    #[test]
    fn test_from_page_texts_keeps_original_numbers() {
        let doc = Document::from_page_texts(
            Path::new("/tmp/lecture.pdf"),
            SourceKind::Pdf,
            vec!["first".to_string(), "   ".to_string(), "third".to_string()],
        );
        assert_eq!(doc.name, "lecture.pdf");
        assert_eq!(doc.page_count(), 2);
        assert!(doc.get_page(2).is_none());
        assert_eq!(doc.get_page(3).unwrap().content, "third");
    }

    #[test]
    fn test_source_key_relative_to_root() {
        let root = Path::new("/course/docs");
        let doc = Document::from_page_texts(
            &root.join("week1").join("notes.pdf"),
            SourceKind::Pdf,
            vec!["text".to_string()],
        );
        assert_eq!(doc.source, "notes.pdf");

        let doc = doc.with_source_root(root);
        assert_eq!(doc.source, "week1/notes.pdf");
        assert_eq!(doc.name, "notes.pdf");
        assert_eq!(source_file_name(&doc.source), "notes.pdf");

        assert_eq!(source_key(Path::new("/elsewhere/a.txt"), root), "a.txt");
        assert_eq!(source_file_name("a.txt"), "a.txt");
    }

    #[test]
    fn test_source_kind_detection() {
        assert_eq!(SourceKind::from_path(Path::new("a.PDF")), Some(SourceKind::Pdf));
        assert_eq!(SourceKind::from_path(Path::new("a.pptx")), Some(SourceKind::Pptx));
        assert_eq!(SourceKind::from_path(Path::new("a.docx")), Some(SourceKind::Docx));
        assert_eq!(SourceKind::from_path(Path::new("a.md")), Some(SourceKind::Text));
        assert_eq!(SourceKind::from_path(Path::new("a.exe")), None);
        assert_eq!(SourceKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_location_label() {
        assert_eq!(SourceKind::Pptx.location_label(), "slide");
        assert_eq!(SourceKind::Pdf.location_label(), "page");
    }

    #[test]
    fn test_estimate_tokens() {
        let text = "one two three four five six seven eight";
        let tokens = estimate_tokens(text);
        // 8 words / 0.75 = 10 tokens
        assert!(tokens >= 10 && tokens <= 12);
        assert!(estimate_tokens("毛泽东思想") >= 5);
    }
}
