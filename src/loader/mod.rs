//! Document loading for PDF, PPTX, DOCX and plain-text course material.
//!
//! Every loader produces a [`Document`] whose pages carry the physical
//! page (or slide) number so answers can cite where text came from.

pub mod office;
pub mod pdf;

use crate::document::{Document, SourceKind};
use crate::error::{RagError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Check if a file has a supported extension.
pub fn is_supported(path: &Path) -> bool {
    SourceKind::from_path(path).is_some()
}

/// Load a single document, choosing the extractor by extension.
pub fn load_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(RagError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        ));
    }

    let kind =
        SourceKind::from_path(path).ok_or_else(|| RagError::UnsupportedFormat(path.to_path_buf()))?;

    let page_texts = match kind {
        SourceKind::Pdf => pdf::extract_pages(path)?,
        SourceKind::Pptx => office::extract_pptx_slides(path)?,
        SourceKind::Docx => office::extract_docx_pages(path)?,
        SourceKind::Text => {
            let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
            content.split('\u{000C}').map(str::to_string).collect()
        }
    };

    let document = Document::from_page_texts(path, kind, page_texts);
    if document.is_empty() {
        return Err(RagError::EmptyDocument(path.to_path_buf()));
    }

    debug!(
        name = %document.name,
        kind = %kind,
        pages = document.page_count(),
        "loaded document"
    );
    Ok(document)
}

/// A file that could not be loaded, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Documents loaded from a directory tree.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// Load every supported file under `dir`, recursively, in path order.
///
/// Unsupported extensions are ignored silently; supported files that fail
/// to load are reported in [`LoadReport::skipped`].
pub fn load_directory(dir: &Path) -> Result<LoadReport> {
    if !dir.is_dir() {
        return Err(RagError::InvalidInput(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_supported(path))
        .collect();
    files.sort();

    info!(dir = %dir.display(), files = files.len(), "loading course documents");

    let mut report = LoadReport::default();
    for path in files {
        match load_document(&path) {
            Ok(document) => report.documents.push(document),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping document");
                report.skipped.push(SkippedFile {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_text_with_form_feeds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "page one\u{000C}page two\u{000C}\u{000C}page four").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.kind, SourceKind::Text);
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.get_page(4).unwrap().content, "page four");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.xlsx");
        fs::write(&path, "x").unwrap();

        assert!(matches!(
            load_document(&path),
            Err(RagError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_empty_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.md");
        fs::write(&path, "  \n\n ").unwrap();

        assert!(matches!(
            load_document(&path),
            Err(RagError::EmptyDocument(_))
        ));
    }

    #[test]
    fn test_load_directory_reports_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("week1")).unwrap();
        fs::write(dir.path().join("week1/b.txt"), "second file").unwrap();
        fs::write(dir.path().join("a.md"), "first file").unwrap();
        fs::write(dir.path().join("broken.docx"), "not a zip").unwrap();
        fs::write(dir.path().join("image.png"), "ignored").unwrap();

        let report = load_directory(dir.path()).unwrap();
        let names: Vec<_> = report.documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("broken.docx"));
    }

    #[test]
    fn test_load_directory_rejects_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "x").unwrap();
        assert!(load_directory(&path).is_err());
    }
}
