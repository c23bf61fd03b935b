//! Configuration for the RAG assistant and the benchmark harness.
//!
//! Supports both environment variables and a YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL for the LLM API (e.g., "https://api.openai.com" or "http://localhost:4000/v1")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name
    pub model: String,

    /// Maximum tokens for response
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Attempts per request before giving up
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1000,
            temperature: 0.0,
            max_retries: 3,
        }
    }
}

/// Where embeddings are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    #[default]
    Api,
    /// Local sentence-transformers model (requires the `local-embeddings` feature).
    Local,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Falls back to `llm.api_base` when empty.
    pub api_base: String,
    /// Falls back to `llm.api_key` when empty.
    pub api_key: String,
    pub model: String,
    /// Texts per embedding request.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Api,
            api_base: String::new(),
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            batch_size: 32,
        }
    }
}

/// Vector store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding collection files.
    pub path: PathBuf,
    /// Collection name; the file is `{path}/{collection}.bin`.
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./vector_db"),
            collection: "try".to_string(),
        }
    }
}

impl StoreConfig {
    /// Path of the collection file.
    pub fn collection_file(&self) -> PathBuf {
        self.path.join(format!("{}.bin", self.collection))
    }
}

/// Text chunking parameters (in characters).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Retrieval and conversation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// User/assistant exchanges of history sent with each question.
    pub max_history_turns: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 1,
            max_history_turns: 5,
        }
    }
}

/// Which QA splits a benchmark run covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SplitSelection {
    /// "all" or a single split name.
    One(String),
    /// An explicit list of split names.
    Many(Vec<String>),
}

impl Default for SplitSelection {
    fn default() -> Self {
        SplitSelection::One("all".to_string())
    }
}

/// Result file format for judged evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Benchmark harness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkSettings {
    pub splits: SplitSelection,
    /// `None` or a negative value means every question.
    pub max_questions_per_split: Option<i64>,
    /// Concurrent answer/judge requests.
    pub workers: usize,
    pub enable_visualization: bool,
    pub qa_data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_format: OutputFormat,
    /// Include the judge's per-dimension reasoning columns.
    pub detailed_reasoning: bool,
    /// Agent answers are cut to this many characters before judging.
    pub answer_max_chars: usize,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            splits: SplitSelection::default(),
            max_questions_per_split: None,
            workers: 4,
            enable_visualization: true,
            qa_data_dir: PathBuf::from("QA_data"),
            output_dir: PathBuf::from("evaluation_results"),
            output_format: OutputFormat::Csv,
            detailed_reasoning: true,
            answer_max_chars: 1000,
        }
    }
}

impl BenchmarkSettings {
    /// Question limit with the "-1 means unlimited" convention applied.
    pub fn question_limit(&self) -> Option<usize> {
        match self.max_questions_per_split {
            Some(n) if n >= 0 => Some(n as usize),
            _ => None,
        }
    }
}

/// Judge overrides. Unset or empty fields inherit from the `llm` section,
/// except `temperature`, which defaults to [`JUDGE_TEMPERATURE`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub max_retries: Option<u32>,
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub chunking: ChunkingConfig,
    pub rag: RagConfig,
    pub benchmark: BenchmarkSettings,
    /// Judge model; the answering model is reused when absent.
    pub judge: Option<JudgeConfig>,
}

/// Judge temperature unless the `judge` section sets one.
pub const JUDGE_TEMPERATURE: f32 = 0.3;

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_API_BASE, LLM_API_KEY, LLM_MODEL, ...)
    /// 2. Config file (`path` if given, else ~/.config/course-rag/config.yaml)
    /// 3. Default values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(default_path) if default_path.exists() => {
                    Self::load_from_file(&default_path)?
                }
                _ => Config::default(),
            },
        };

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text. Missing sections keep their defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| RagError::Config(format!("Failed to parse config file: {}", e)))
    }

    fn apply_env(&mut self) {
        if let Ok(api_base) = env::var("LLM_API_BASE") {
            self.llm.api_base = api_base;
        }

        if let Ok(api_key) = env::var("LLM_API_KEY") {
            self.llm.api_key = api_key;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            self.llm.model = model;
        }

        if let Ok(max_tokens) = env::var("LLM_MAX_TOKENS") {
            if let Ok(tokens) = max_tokens.parse() {
                self.llm.max_tokens = tokens;
            }
        }

        if let Ok(temperature) = env::var("LLM_TEMPERATURE") {
            if let Ok(temp) = temperature.parse() {
                self.llm.temperature = temp;
            }
        }

        if let Ok(api_base) = env::var("EMBEDDING_API_BASE") {
            self.embedding.api_base = api_base;
        }

        if let Ok(api_key) = env::var("EMBEDDING_API_KEY") {
            self.embedding.api_key = api_key;
        }

        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        if let Ok(path) = env::var("VECTOR_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }

        if let Ok(collection) = env::var("COLLECTION_NAME") {
            self.store.collection = collection;
        }

        if let Ok(model) = env::var("JUDGE_MODEL") {
            self.judge.get_or_insert_with(JudgeConfig::default).model = Some(model);
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "course-rag")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// LLM settings for the judge, with unset fields taken from `llm`.
    pub fn judge_llm(&self) -> LlmConfig {
        let judge = self.judge.clone().unwrap_or_default();
        let or_llm = |value: Option<String>, fallback: &str| {
            value
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        LlmConfig {
            api_base: or_llm(judge.api_base, &self.llm.api_base),
            api_key: or_llm(judge.api_key, &self.llm.api_key),
            model: or_llm(judge.model, &self.llm.model),
            max_tokens: judge.max_tokens.unwrap_or(self.llm.max_tokens),
            temperature: judge.temperature.unwrap_or(JUDGE_TEMPERATURE),
            max_retries: judge.max_retries.unwrap_or(self.llm.max_retries),
        }
    }

    /// Embedding settings with API credentials inherited from the LLM section.
    pub fn resolved_embedding(&self) -> EmbeddingConfig {
        let mut embedding = self.embedding.clone();
        if embedding.api_base.is_empty() {
            embedding.api_base = self.llm.api_base.clone();
        }
        if embedding.api_key.is_empty() {
            embedding.api_key = self.llm.api_key.clone();
        }
        embedding
    }

    /// Validate that required configuration is present and consistent.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_base.is_empty() {
            return Err(RagError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.api_key.is_empty() {
            return Err(RagError::Config(
                "LLM API key is required. Set LLM_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.model.is_empty() {
            return Err(RagError::Config(
                "LLM model is required. Set LLM_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }

        let judge = self.judge_llm();
        if judge.api_base.is_empty() || judge.api_key.is_empty() || judge.model.is_empty() {
            return Err(RagError::Config(
                "Judge API base, key and model are required. Set them in the judge or llm section."
                    .to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&judge.temperature) {
            return Err(RagError::InvalidConfig(format!(
                "judge.temperature ({}) must be between 0 and 2",
                judge.temperature
            )));
        }

        self.validate_settings()
    }

    /// Checks that do not depend on credentials.
    pub fn validate_settings(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunking.chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        if self.rag.top_k == 0 {
            return Err(RagError::InvalidConfig(
                "rag.top_k must be at least 1".to_string(),
            ));
        }

        if self.benchmark.workers == 0 {
            return Err(RagError::InvalidConfig(
                "benchmark.workers must be at least 1".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(RagError::InvalidConfig(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_llm(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm: LlmConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                model: model.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
