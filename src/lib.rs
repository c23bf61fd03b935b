//! course-rag - retrieval-augmented question answering over course documents.
//!
//! Course material (PDF, PPTX, DOCX, plain text) is split into overlapping
//! chunks, embedded through an OpenAI-compatible API and kept in a local
//! vector collection. Questions are answered by a chat model that sees the
//! most similar chunks and cites their file and page.
//!
//! # Quick Start
//!
//! ```no_run
//! use course_rag::{
//!     agent::RagAgent,
//!     config::Config,
//!     embedding::ConfiguredEmbedder,
//!     ingest::Ingestor,
//!     llm::LlmClient,
//!     splitter::TextSplitter,
//!     store::VectorStore,
//! };
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!
//!     let embedder = ConfiguredEmbedder::from_config(
//!         &config.resolved_embedding(),
//!         config.llm.max_retries,
//!     )?;
//!     let mut store = VectorStore::open(&config.store, embedder)?;
//!
//!     // Build the collection
//!     Ingestor::new(&mut store, TextSplitter::from_config(&config.chunking))
//!         .ingest_paths(&[PathBuf::from("data")])
//!         .await?;
//!
//!     // Ask a question
//!     let agent = RagAgent::new(store, LlmClient::new(config.llm.clone()), config.rag.clone());
//!     let answer = agent.answer_question("What is the mass line?", None).await?;
//!     println!("{}", answer.text);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **loader**: document text with page or slide numbers
//! - **splitter**: sentence-aware overlapping chunks
//! - **store**: persisted collection with cosine search
//! - **agent**: retrieval, prompting and conversation history
//! - **eval**: LLM-judged benchmark over the course QA splits

pub mod agent;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod persistence;
pub mod retry;
pub mod splitter;
pub mod store;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use agent::{Answer, Conversation, RagAgent, SourceRef};
pub use config::Config;
pub use document::Document;
pub use embedding::{ConfiguredEmbedder, Embedder};
pub use error::{RagError, Result};
pub use ingest::{IngestReport, Ingestor};
pub use llm::{ChatModel, LlmClient};
pub use splitter::{Chunk, TextSplitter};
pub use store::{SearchHit, VectorStore};
