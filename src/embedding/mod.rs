//! Text embeddings.
//!
//! [`ApiEmbedder`] calls an OpenAI-compatible `/v1/embeddings` endpoint.
//! With the `local-embeddings` feature, [`LocalEmbedder`] runs a
//! sentence-transformers model in-process.

mod api;
#[cfg(feature = "local-embeddings")]
mod local;

pub use api::ApiEmbedder;
#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{RagError, Result};

/// Something that turns text into fixed-length vectors.
#[allow(async_fn_in_trait)]
pub trait Embedder {
    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the model, stored with the collection.
    fn model_id(&self) -> &str;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::LlmApi("embedding response was empty".to_string()))
    }
}

/// The embedder selected by `embedding.backend`.
pub enum ConfiguredEmbedder {
    Api(ApiEmbedder),
    #[cfg(feature = "local-embeddings")]
    Local(LocalEmbedder),
}

impl ConfiguredEmbedder {
    /// Build the configured backend. `max_retries` applies to API requests.
    pub fn from_config(config: &EmbeddingConfig, max_retries: u32) -> Result<Self> {
        match config.backend {
            EmbeddingBackend::Api => Ok(Self::Api(ApiEmbedder::new(config.clone(), max_retries))),
            #[cfg(feature = "local-embeddings")]
            EmbeddingBackend::Local => Ok(Self::Local(LocalEmbedder::load(&config.model)?)),
            #[cfg(not(feature = "local-embeddings"))]
            EmbeddingBackend::Local => Err(RagError::InvalidConfig(
                "embedding.backend 'local' requires the local-embeddings feature".to_string(),
            )),
        }
    }
}

impl Embedder for ConfiguredEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            Self::Api(embedder) => embedder.embed(texts).await,
            #[cfg(feature = "local-embeddings")]
            Self::Local(embedder) => embedder.embed(texts).await,
        }
    }

    fn model_id(&self) -> &str {
        match self {
            Self::Api(embedder) => embedder.model_id(),
            #[cfg(feature = "local-embeddings")]
            Self::Local(embedder) => embedder.model_id(),
        }
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
