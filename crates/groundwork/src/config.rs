//! TOML configuration for the Groundwork service.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use groundwork_core::retrieve::RetrievalParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Where uploaded document bytes live. `Document::storage_path` is resolved
/// against `root`.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: default_target_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_target_chars() -> usize {
    groundwork_core::chunk::TARGET_CHUNK_CHARS
}
fn default_overlap_chars() -> usize {
    groundwork_core::chunk::CHUNK_OVERLAP_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_vector_limit")]
    pub vector_limit: usize,
    #[serde(default = "default_chunk_scan_limit")]
    pub chunk_scan_limit: usize,
    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: usize,
    #[serde(default = "default_keyword_score_floor")]
    pub keyword_score_floor: f32,
    #[serde(default = "default_page_scan_limit")]
    pub page_scan_limit: usize,
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    #[serde(default = "default_page_text_limit")]
    pub page_text_limit: usize,
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let p = RetrievalParams::default();
        Self {
            similarity_threshold: p.similarity_threshold,
            vector_limit: p.vector_limit,
            chunk_scan_limit: p.chunk_scan_limit,
            keyword_limit: p.keyword_limit,
            keyword_score_floor: p.keyword_score_floor,
            page_scan_limit: p.page_scan_limit,
            page_limit: p.page_limit,
            page_text_limit: p.page_text_limit,
            final_limit: p.final_limit,
        }
    }
}

fn default_similarity_threshold() -> f32 {
    RetrievalParams::default().similarity_threshold
}
fn default_vector_limit() -> usize {
    RetrievalParams::default().vector_limit
}
fn default_chunk_scan_limit() -> usize {
    RetrievalParams::default().chunk_scan_limit
}
fn default_keyword_limit() -> usize {
    RetrievalParams::default().keyword_limit
}
fn default_keyword_score_floor() -> f32 {
    RetrievalParams::default().keyword_score_floor
}
fn default_page_scan_limit() -> usize {
    RetrievalParams::default().page_scan_limit
}
fn default_page_limit() -> usize {
    RetrievalParams::default().page_limit
}
fn default_page_text_limit() -> usize {
    RetrievalParams::default().page_text_limit
}
fn default_final_limit() -> usize {
    RetrievalParams::default().final_limit
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            similarity_threshold: self.similarity_threshold,
            vector_limit: self.vector_limit,
            chunk_scan_limit: self.chunk_scan_limit,
            keyword_limit: self.keyword_limit,
            keyword_score_floor: self.keyword_score_floor,
            page_scan_limit: self.page_scan_limit,
            page_limit: self.page_limit,
            page_text_limit: self.page_text_limit,
            final_limit: self.final_limit,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `hash` (deterministic, local), `remote` (HTTP batch service), or
    /// `disabled`.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: None,
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "hash".to_string()
}
fn default_dims() -> usize {
    groundwork_core::features::EMBEDDING_DIMS
}
fn default_batch_size() -> usize {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.backend != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.target_chars == 0 {
        anyhow::bail!("chunking.target_chars must be > 0");
    }
    // the chunker only accepts cut points past the window midpoint, so the
    // overlap must stay below it for the window to make forward progress
    if config.chunking.overlap_chars * 2 >= config.chunking.target_chars {
        anyhow::bail!("chunking.overlap_chars must be less than half of target_chars");
    }

    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        anyhow::bail!("retrieval.similarity_threshold must be in [0.0, 1.0]");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be >= 1");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    match config.embedding.backend.as_str() {
        "hash" | "disabled" => {}
        "remote" => {
            if config.embedding.endpoint.is_none() {
                anyhow::bail!("embedding.endpoint must be set when backend is 'remote'");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding backend: '{}'. Must be hash, remote, or disabled.",
            other
        ),
    }

    Ok(())
}
