//! Configuration management for knowbase
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Ingestion worker configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Paths configuration (internal, derived from the base directory)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible provider base URL
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// Environment variable name for the provider API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Texts per provider call
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Retry attempts after the first failed call
    #[serde(default = "default_embedding_max_retries")]
    pub max_retries: usize,

    /// Base backoff between retries, doubled each attempt
    #[serde(default = "default_embedding_backoff_ms")]
    pub backoff_ms: u64,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider_url: default_provider_url(),
            api_key_env: default_api_key_env(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            max_retries: default_embedding_max_retries(),
            backoff_ms: default_embedding_backoff_ms(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Target maximum characters per chunk
    #[serde(default = "default_chunk_max_chars")]
    pub max_chars: usize,

    /// Overlap characters between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap_chars: usize,

    /// How far into the target window a sentence/paragraph break must
    /// fall to be preferred over a hard cut (0.0..1.0)
    #[serde(default = "default_min_break_fraction")]
    pub min_break_fraction: f32,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: default_chunk_max_chars(),
            overlap_chars: default_chunk_overlap(),
            min_break_fraction: default_min_break_fraction(),
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results
    #[serde(default = "default_search_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for a result to be returned
    #[serde(default = "default_search_min_score")]
    pub min_score: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_search_top_k(),
            min_score: default_search_min_score(),
        }
    }
}

/// Ingestion worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Number of background ingestion workers
    #[serde(default = "default_ingest_workers")]
    pub workers: usize,

    /// Pending job capacity before enqueue blocks
    #[serde(default = "default_ingest_queue_capacity")]
    pub queue_capacity: usize,

    /// Text extraction timeout in seconds
    #[serde(default = "default_extract_timeout")]
    pub extract_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_ingest_workers(),
            queue_capacity: default_ingest_queue_capacity(),
            extract_timeout_secs: default_extract_timeout(),
        }
    }
}

/// Derived filesystem paths
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base data directory
    pub base_dir: PathBuf,
    /// SQLite database file
    pub db_file: PathBuf,
    /// Directory holding uploaded blobs
    pub blob_dir: PathBuf,
}

impl Config {
    /// Default base directory for data files
    pub fn default_base_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("knowbase")
    }

    /// Default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Load configuration from a TOML file and derive paths from its
    /// parent directory
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_base_dir);
        config.set_base_dir(base);
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Derive data paths from a base directory
    pub fn set_base_dir(&mut self, base: PathBuf) {
        self.paths.db_file = base.join("knowbase.db");
        self.paths.blob_dir = base.join("blobs");
        self.paths.base_dir = base;
    }

    fn validate(&self) -> Result<()> {
        if self.chunk.max_chars == 0 {
            return Err(Error::Config("chunk.max_chars must be positive".into()));
        }
        if self.chunk.overlap_chars >= self.chunk.max_chars {
            return Err(Error::Config(
                "chunk.overlap_chars must be smaller than chunk.max_chars".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.chunk.min_break_fraction) {
            return Err(Error::Config(
                "chunk.min_break_fraction must be in [0.0, 1.0)".into(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding.dimension must be positive".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be positive".into()));
        }
        if self.ingest.workers == 0 {
            warn!("ingest.workers is 0; raising to 1");
        }
        Ok(())
    }
}
