//! Error types for the RAG pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur while building, querying or serving the assistant.
#[derive(Error, Debug)]
pub enum RagError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The file extension is not one of the supported document formats.
    #[error("Unsupported document format for '{0}'")]
    UnsupportedFormat(PathBuf),

    /// Text extraction failed for a document.
    #[error("Failed to extract text from '{path}': {reason}")]
    Extraction { path: PathBuf, reason: String },

    /// The document contained no extractable text.
    #[error("No text found in document '{0}'")]
    EmptyDocument(PathBuf),

    /// The vector collection file does not exist.
    #[error("Collection not found at '{0}'")]
    CollectionNotFound(PathBuf),

    /// An embedding did not match the collection's dimension.
    #[error("Embedding dimension mismatch: collection uses {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid input to an operation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// LLM or embedding API error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// Non-success HTTP status from the LLM or embedding API.
    #[error("API error ({status}): {message}")]
    ApiStatus { status: u16, message: String },

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an extraction error with path context.
    pub fn extraction(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::LlmParse(err.to_string())
    }
}
