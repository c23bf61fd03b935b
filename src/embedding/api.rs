//! OpenAI-compatible embedding client.

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};
use crate::llm::api_url;
use crate::retry::RetryPolicy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Embeddings from a remote `/v1/embeddings` endpoint.
#[derive(Clone)]
pub struct ApiEmbedder {
    client: Client,
    config: EmbeddingConfig,
    retry: RetryPolicy,
}

impl ApiEmbedder {
    pub fn new(config: EmbeddingConfig, max_retries: u32) -> Self {
        Self {
            client: Client::new(),
            config,
            retry: RetryPolicy::new(max_retries),
        }
    }

    fn endpoint(&self) -> String {
        api_url(&self.config.api_base, "embeddings")
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: batch,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RagError::ApiStatus {
                status: status.as_u16(),
                message: format!("embedding request failed: {}", body),
            });
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)?;
        parse_embeddings(parsed, batch.len())
    }
}

/// Order vectors by `index` and check one came back per input.
fn parse_embeddings(mut response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        return Err(RagError::LlmParse(format!(
            "expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }

    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

impl Embedder for ApiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.config.batch_size.max(1)) {
            debug!(batch = batch.len(), model = %self.config.model, "embedding batch");
            let vectors = self
                .retry
                .run("embeddings", || self.embed_batch(batch))
                .await?;
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}
