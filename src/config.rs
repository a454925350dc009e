//! Configuration loading.
//!
//! Covers every key in the external-interfaces configuration table. Parsed
//! once at startup and re-read on `admin reload`; reload never touches
//! persistent data (the threshold lives in the metadata store, not here).

use crate::constants::{
    DEFAULT_CACHE_MAX_MEMORY_MB, DEFAULT_DEBOUNCE_MS, DEFAULT_RERANK_ALPHA,
    DEFAULT_SEARCH_LIMIT, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Selects embedding backend, e.g. "openai", "local".
    pub provider: String,
    /// Model name; part of the provider fingerprint.
    pub model: String,
    /// Vector dimension D.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// C6 debounce window, default 1500ms.
    pub debounce_delay_ms: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            debounce_delay_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned, default 10.
    pub default_limit: usize,
    /// Default/max radius when the caller omits one.
    pub radius: f64,
    /// Initial threshold; migrated into the metadata store's singleton row
    /// on first run and ignored thereafter (mutable via `admin threshold`).
    pub threshold: f32,
    /// Semantic vs keyword weight in hybrid rerank, default ~0.75.
    pub rerank_alpha: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_SEARCH_LIMIT,
            radius: 16.0,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            rerank_alpha: DEFAULT_RERANK_ALPHA,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// "hybrid-local" or "remote".
    pub backend: String,
    /// Directory holding metadata.db, vectors.idx and the fingerprint file.
    pub data_dir: PathBuf,
    pub cache_max_memory_mb: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "hybrid-local".to_string(),
            data_dir: PathBuf::from(".container-search"),
            cache_max_memory_mb: DEFAULT_CACHE_MAX_MEMORY_MB,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any key the file omits. Missing file is not an error: a fresh
    /// install runs on defaults until `admin reload` is given a real file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Configuration(format!("reading {}: {e}", path.display())))?;

        toml::from_str(&content)
            .map_err(|e| EngineError::Configuration(format!("parsing {}: {e}", path.display())))
    }
}
