//! Build pipeline: load documents, split them and add them to the store.

use crate::document::Document;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::loader::{self, SkippedFile};
use crate::splitter::TextSplitter;
use crate::store::VectorStore;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// What one ingested document contributed.
#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub name: String,
    pub pages: usize,
    pub chunks: usize,
}

/// Summary of an ingestion run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents: Vec<IngestedDocument>,
    pub skipped: Vec<SkippedFile>,
}

impl IngestReport {
    pub fn total_pages(&self) -> usize {
        self.documents.iter().map(|d| d.pages).sum()
    }

    pub fn total_chunks(&self) -> usize {
        self.documents.iter().map(|d| d.chunks).sum()
    }
}

/// Feeds documents into a vector store.
pub struct Ingestor<'a, E> {
    store: &'a mut VectorStore<E>,
    splitter: TextSplitter,
}

impl<'a, E: Embedder> Ingestor<'a, E> {
    pub fn new(store: &'a mut VectorStore<E>, splitter: TextSplitter) -> Self {
        Self { store, splitter }
    }

    /// Ingest files and directories, then save the store.
    ///
    /// Documents under a directory are keyed by their path relative to it,
    /// loose files by their file name. A re-ingested document replaces its
    /// previous records; a second document with a key already used in this
    /// run is skipped. Files that cannot be loaded are reported, not fatal;
    /// embedding or save errors are.
    pub async fn ingest_paths(&mut self, paths: &[PathBuf]) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let mut documents = Vec::new();

        for path in paths {
            if path.is_dir() {
                let loaded = loader::load_directory(path)?;
                documents.extend(
                    loaded
                        .documents
                        .into_iter()
                        .map(|document| document.with_source_root(path)),
                );
                report.skipped.extend(loaded.skipped);
            } else {
                match loader::load_document(path) {
                    Ok(document) => documents.push(document),
                    Err(e) => report.skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    }),
                }
            }
        }

        let mut seen = HashSet::new();
        for document in &documents {
            if !seen.insert(document.source.clone()) {
                warn!(source = %document.source, "duplicate document in ingest run");
                report.skipped.push(SkippedFile {
                    path: document.path.clone().unwrap_or_default(),
                    reason: format!("duplicate source '{}' in this run", document.source),
                });
                continue;
            }
            report.documents.push(self.ingest_document(document).await?);
        }

        self.store.save()?;

        info!(
            documents = report.documents.len(),
            chunks = report.total_chunks(),
            skipped = report.skipped.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    /// Replace a document's records with freshly embedded chunks.
    pub async fn ingest_document(&mut self, document: &Document) -> Result<IngestedDocument> {
        let removed = self.store.remove_source(&document.source);
        let chunks = self.splitter.split_document(document);
        let added = self.store.add_chunks(&chunks).await?;

        info!(
            document = %document.source,
            pages = document.page_count(),
            chunks = added,
            replaced = removed,
            "ingested document"
        );

        Ok(IngestedDocument {
            name: document.source.clone(),
            pages: document.page_count(),
            chunks: added,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::test_support::KeywordEmbedder;
    use std::fs;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> VectorStore<KeywordEmbedder> {
        let config = StoreConfig {
            path: dir.path().join("db"),
            collection: "course".to_string(),
        };
        VectorStore::open(&config, KeywordEmbedder).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_directory_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir(&docs).unwrap();
        fs::write(docs.join("one.txt"), "First page.\u{000C}Second page.").unwrap();
        fs::write(docs.join("two.md"), "Another document.").unwrap();

        let mut store = open_store(&dir);
        let report = Ingestor::new(&mut store, TextSplitter::new(500, 50))
            .ingest_paths(&[docs.clone(), dir.path().join("missing.pdf")])
            .await
            .unwrap();

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.total_pages(), 3);
        assert_eq!(report.total_chunks(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_reingest_replaces_records() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "One. Two. Three. Four. Five. Six.").unwrap();

        let mut store = open_store(&dir);
        Ingestor::new(&mut store, TextSplitter::new(10, 0))
            .ingest_paths(&[file.clone()])
            .await
            .unwrap();
        let first = store.len();
        assert!(first > 1);

        fs::write(&file, "Short now.").unwrap();
        Ingestor::new(&mut store, TextSplitter::new(10, 0))
            .ingest_paths(&[file])
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.sources(), vec!["notes.txt"]);
    }

    #[tokio::test]
    async fn test_same_file_name_in_different_folders() {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(docs.join("week1")).unwrap();
        fs::create_dir_all(docs.join("week2")).unwrap();
        fs::write(docs.join("week1/notes.txt"), "Dialectics studies contradiction.").unwrap();
        fs::write(docs.join("week2/notes.txt"), "The mass line comes from the masses.").unwrap();

        let mut store = open_store(&dir);
        let report = Ingestor::new(&mut store, TextSplitter::new(500, 50))
            .ingest_paths(&[docs.clone()])
            .await
            .unwrap();

        assert_eq!(report.documents.len(), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.sources(), vec!["week1/notes.txt", "week2/notes.txt"]);
        let locations: Vec<String> = store
            .collection()
            .records
            .iter()
            .map(|r| r.metadata.location())
            .collect();
        assert_eq!(locations, vec!["notes.txt, page 1", "notes.txt, page 1"]);

        // Re-ingesting one folder leaves the other untouched
        Ingestor::new(&mut store, TextSplitter::new(500, 50))
            .ingest_paths(&[docs.clone()])
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_file_arguments_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        let first = dir.path().join("a/notes.txt");
        let second = dir.path().join("b/notes.txt");
        fs::write(&first, "First notes.").unwrap();
        fs::write(&second, "Second notes.").unwrap();

        let mut store = open_store(&dir);
        let report = Ingestor::new(&mut store, TextSplitter::new(500, 50))
            .ingest_paths(&[first, second.clone()])
            .await
            .unwrap();

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, second);
        assert!(report.skipped[0].reason.contains("duplicate source"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.collection().records[0].text, "First notes.");
    }
}
