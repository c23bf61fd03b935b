//! Persisted vector collection with brute-force cosine search.

use crate::config::StoreConfig;
use crate::document::{SourceKind, source_file_name};
use crate::embedding::{Embedder, cosine_similarity};
use crate::error::{RagError, Result};
use crate::persistence;
use crate::splitter::Chunk;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a chunk came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ChunkMetadata {
    /// Store key of the source document, see [`crate::document::Document::source`].
    pub source: String,
    /// Page or slide number.
    pub page: usize,
    pub kind: SourceKind,
    pub chunk_index: usize,
}

impl ChunkMetadata {
    /// File name of the source document.
    pub fn file_name(&self) -> &str {
        source_file_name(&self.source)
    }

    /// Citation label such as `lecture.pptx, slide 4`.
    pub fn location(&self) -> String {
        format!(
            "{}, {} {}",
            self.file_name(),
            self.kind.location_label(),
            self.page
        )
    }
}

/// A stored chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct ChunkRecord {
    /// `{source}#{page}#{chunk_index}`
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

impl ChunkRecord {
    pub fn new(text: String, metadata: ChunkMetadata, embedding: Vec<f32>) -> Self {
        Self {
            id: record_id(&metadata),
            text,
            metadata,
            embedding,
        }
    }
}

fn record_id(metadata: &ChunkMetadata) -> String {
    format!(
        "{}#{}#{}",
        metadata.source, metadata.page, metadata.chunk_index
    )
}

/// The on-disk collection.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct Collection {
    pub name: String,
    /// Model that produced the embeddings.
    pub embedding_model: String,
    /// Fixed by the first embedding added.
    pub dimension: Option<usize>,
    pub records: Vec<ChunkRecord>,
}

impl Collection {
    pub fn new(name: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            embedding_model: embedding_model.into(),
            dimension: None,
            records: Vec::new(),
        }
    }
}

/// A search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: ChunkRecord,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// A collection bound to the embedder that fills and queries it.
pub struct VectorStore<E> {
    collection: Collection,
    embedder: E,
    path: PathBuf,
}

impl<E: Embedder> VectorStore<E> {
    /// Open the configured collection, starting empty if it does not exist yet.
    pub fn open(config: &StoreConfig, embedder: E) -> Result<Self> {
        let path = config.collection_file();

        let collection = if persistence::collection_exists(&path) {
            let collection = persistence::load_collection(&path)?;
            if collection.embedding_model != embedder.model_id() {
                warn!(
                    stored = %collection.embedding_model,
                    configured = embedder.model_id(),
                    "collection was built with a different embedding model"
                );
            }
            info!(
                path = %path.display(),
                records = collection.records.len(),
                "opened collection"
            );
            collection
        } else {
            debug!(path = %path.display(), "creating new collection");
            Collection::new(config.collection.clone(), embedder.model_id())
        };

        Ok(Self {
            collection,
            embedder,
            path,
        })
    }

    /// An empty, unsaved store at `path`.
    pub fn in_memory(name: &str, path: impl Into<PathBuf>, embedder: E) -> Self {
        let collection = Collection::new(name, embedder.model_id());
        Self {
            collection,
            embedder,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn len(&self) -> usize {
        self.collection.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.records.is_empty()
    }

    fn check_dimension(&mut self, actual: usize) -> Result<()> {
        match self.collection.dimension {
            Some(expected) if expected != actual => {
                Err(RagError::DimensionMismatch { expected, actual })
            }
            Some(_) => Ok(()),
            None => {
                self.collection.dimension = Some(actual);
                Ok(())
            }
        }
    }

    /// Embed and insert chunks, replacing records with the same id.
    /// Returns the number of chunks written.
    pub async fn add_chunks(&mut self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::LlmParse(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        for embedding in &embeddings {
            self.check_dimension(embedding.len())?;
        }

        let mut positions: HashMap<String, usize> = self
            .collection
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let metadata = ChunkMetadata {
                source: chunk.source.clone(),
                page: chunk.page,
                kind: chunk.kind,
                chunk_index: chunk.chunk_index,
            };
            let record = ChunkRecord::new(chunk.text.clone(), metadata, embedding);

            match positions.get(&record.id) {
                Some(&i) => self.collection.records[i] = record,
                None => {
                    positions.insert(record.id.clone(), self.collection.records.len());
                    self.collection.records.push(record);
                }
            }
        }

        Ok(chunks.len())
    }

    /// Remove every record of a source document. Returns how many were removed.
    pub fn remove_source(&mut self, source: &str) -> usize {
        let before = self.collection.records.len();
        self.collection
            .records
            .retain(|r| r.metadata.source != source);
        before - self.collection.records.len()
    }

    /// Distinct source documents, sorted.
    pub fn sources(&self) -> Vec<String> {
        self.collection
            .records
            .iter()
            .map(|r| r.metadata.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Drop every record and forget the dimension.
    pub fn clear(&mut self) {
        self.collection.records.clear();
        self.collection.dimension = None;
        self.collection.embedding_model = self.embedder.model_id().to_string();
    }

    pub fn save(&self) -> Result<()> {
        persistence::save_collection(&self.collection, &self.path)?;
        info!(
            path = %self.path.display(),
            records = self.collection.records.len(),
            "saved collection"
        );
        Ok(())
    }

    /// The `top_k` records most similar to `query`, best first.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_one(query).await?;
        if let Some(expected) = self.collection.dimension {
            if expected != query_embedding.len() {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: query_embedding.len(),
                });
            }
        }

        let mut hits: Vec<SearchHit> = self
            .collection
            .records
            .iter()
            .map(|record| SearchHit {
                score: cosine_similarity(&query_embedding, &record.embedding),
                record: record.clone(),
            })
            .collect();

        // Sort by score descending
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::KeywordEmbedder;
    use tempfile::TempDir;

    fn chunk(source: &str, page: usize, index: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source: source.to_string(),
            page,
            kind: SourceKind::Pdf,
            chunk_index: index,
            start_pos: 0,
            end_pos: text.chars().count(),
        }
    }

    fn store_in(dir: &TempDir) -> VectorStore<KeywordEmbedder> {
        let config = StoreConfig {
            path: dir.path().to_path_buf(),
            collection: "test".to_string(),
        };
        VectorStore::open(&config, KeywordEmbedder::default()).unwrap()
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store
            .add_chunks(&[
                chunk("a.pdf", 1, 0, "practice is the criterion of truth"),
                chunk("a.pdf", 2, 1, "contradiction drives development"),
                chunk("b.pdf", 7, 0, "the mass line in party work"),
            ])
            .await
            .unwrap();

        let hits = store.search("what is the criterion of truth", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.metadata.page, 1);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_empty_store_and_large_top_k() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert!(store.search("anything", 5).await.unwrap().is_empty());

        store
            .add_chunks(&[chunk("a.pdf", 1, 0, "only chunk")])
            .await
            .unwrap();
        assert_eq!(store.search("chunk", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_and_remove_source() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store
            .add_chunks(&[chunk("a.pdf", 1, 0, "old"), chunk("b.pdf", 1, 0, "other")])
            .await
            .unwrap();
        store
            .add_chunks(&[chunk("a.pdf", 1, 0, "new")])
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.sources(), vec!["a.pdf", "b.pdf"]);
        assert!(store.collection().records.iter().any(|r| r.text == "new"));

        assert_eq!(store.remove_source("a.pdf"), 1);
        assert_eq!(store.sources(), vec!["b.pdf"]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.collection.dimension = Some(3);

        let result = store.add_chunks(&[chunk("a.pdf", 1, 0, "text")]).await;
        assert!(matches!(
            result,
            Err(RagError::DimensionMismatch { expected: 3, .. })
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = store_in(&dir);
            store
                .add_chunks(&[chunk("a.pdf", 3, 0, "persisted text")])
                .await
                .unwrap();
            store.save().unwrap();
        }

        let store = store_in(&dir);
        assert_eq!(store.len(), 1);
        assert_eq!(store.collection().records[0].id, "a.pdf#3#0");
        assert!(store.path().ends_with("test.bin"));
    }

    #[test]
    fn test_location_label() {
        let metadata = ChunkMetadata {
            source: "deck.pptx".to_string(),
            page: 4,
            kind: SourceKind::Pptx,
            chunk_index: 0,
        };
        assert_eq!(metadata.location(), "deck.pptx, slide 4");
    }
}
