//! TOML configuration parsing and validation.
//!
//! A single [`Config`] is loaded per run and passed by reference to every
//! operation. Nothing is read from process globals except the API key,
//! whose environment variable name is itself configured.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use travel_search_core::embedding::DistanceSpace;
use travel_search_core::search::{SearchParams, MAX_LIMIT};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    #[serde(default = "default_collection_name")]
    pub name: String,
    #[serde(default = "default_space")]
    pub space: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: default_collection_name(),
            space: default_space(),
        }
    }
}

fn default_collection_name() -> String {
    "TRAVEL".to_string()
}
fn default_space() -> String {
    "cosine".to_string()
}

impl CollectionConfig {
    pub fn distance_space(&self) -> Result<DistanceSpace> {
        self.space.parse()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub csv_path: PathBuf,
}

impl SourceConfig {
    /// Final path component, stored as `file_name` metadata.
    pub fn file_name(&self) -> String {
        self.csv_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_ingest_batch_size(),
        }
    }
}

fn default_ingest_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_k: default_candidate_k(),
            final_limit: default_final_limit(),
            threshold: default_threshold(),
        }
    }
}

fn default_candidate_k() -> usize {
    10
}
fn default_final_limit() -> usize {
    10
}
fn default_threshold() -> f64 {
    0.80
}

impl RetrievalConfig {
    pub fn params(&self) -> SearchParams {
        SearchParams {
            candidate_k: self.candidate_k,
            limit: self.final_limit,
            threshold: self.threshold,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL. OpenAI defaults to `https://api.openai.com/v1`; Azure
    /// requires the resource endpoint.
    #[serde(default)]
    pub api_base: Option<String>,
    /// Azure `api-version` query parameter.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Azure deployment id.
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            api_base: None,
            api_version: None,
            deployment: None,
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Result limits must lie in `1..=MAX_LIMIT`.
pub fn check_limit(name: &str, limit: usize) -> Result<()> {
    if !(1..=MAX_LIMIT).contains(&limit) {
        anyhow::bail!("{} must be between 1 and {}, got {}", name, MAX_LIMIT, limit);
    }
    Ok(())
}

/// Similarity thresholds must lie in `[0.0, 1.0]`.
pub fn check_threshold(name: &str, threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!("{} must be in [0.0, 1.0], got {}", name, threshold);
    }
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    config.collection.distance_space()?;

    if config.collection.name.trim().is_empty() {
        anyhow::bail!("collection.name must not be empty");
    }

    if config.ingest.batch_size == 0 {
        anyhow::bail!("ingest.batch_size must be > 0");
    }

    check_limit("retrieval.final_limit", config.retrieval.final_limit)?;
    check_threshold("retrieval.threshold", config.retrieval.threshold)?;

    let emb = &config.embedding;
    match emb.provider.as_str() {
        "disabled" => {}
        "openai" | "azure" => {
            if emb.dims.is_none() || emb.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    emb.provider
                );
            }
            if emb.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    emb.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or azure.",
            other
        ),
    }

    if emb.provider == "azure" {
        for (key, value) in [
            ("api_base", &emb.api_base),
            ("api_version", &emb.api_version),
            ("deployment", &emb.deployment),
        ] {
            if value.is_none() {
                anyhow::bail!("embedding.{} is required when provider is 'azure'", key);
            }
        }
    }

    Ok(())
}
