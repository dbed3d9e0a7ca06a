//! Embedding provider implementations.
//!
//! Concrete [`EmbeddingProvider`]s for the app crate:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls an OpenAI-compatible embeddings endpoint,
//!   either the public OpenAI API or an Azure OpenAI deployment.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

pub use travel_search_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"`. Collections can still be
/// created, counted, and read; anything that needs a vector fails.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.")
    }
}

// ============ OpenAI / Azure Provider ============

/// Where and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    /// `POST {base}/embeddings` with `Authorization: Bearer`.
    OpenAI { base: String },
    /// `POST {base}/openai/deployments/{deployment}/embeddings?api-version=..`
    /// with an `api-key` header.
    Azure {
        base: String,
        deployment: String,
        api_version: String,
    },
}

impl Endpoint {
    fn url(&self) -> String {
        match self {
            Endpoint::OpenAI { base } => format!("{}/embeddings", base.trim_end_matches('/')),
            Endpoint::Azure {
                base,
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                base.trim_end_matches('/'),
                deployment,
                api_version
            ),
        }
    }
}

/// Embedding provider using the OpenAI embeddings API or an Azure OpenAI
/// deployment of it.
///
/// The API key is read from the environment variable named by
/// `embedding.api_key_env` when the provider is created.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    endpoint: Endpoint,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set, Azure settings are
    /// incomplete, or the API key variable is not set.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for {} provider", config.provider))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for {} provider", config.provider))?;

        let endpoint = match config.provider.as_str() {
            "azure" => Endpoint::Azure {
                base: required(&config.api_base, "api_base")?,
                deployment: required(&config.deployment, "deployment")?,
                api_version: required(&config.api_version, "api_version")?,
            },
            _ => Endpoint::OpenAI {
                base: config
                    .api_base
                    .clone()
                    .unwrap_or_else(|| OPENAI_API_BASE.to_string()),
            },
        };

        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            endpoint,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }

    fn request(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let req = self.client.post(self.endpoint.url()).json(body);
        match self.endpoint {
            Endpoint::OpenAI { .. } => req.bearer_auth(&self.api_key),
            Endpoint::Azure { .. } => req.header("api-key", &self.api_key),
        }
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String> {
    value
        .clone()
        .ok_or_else(|| anyhow::anyhow!("embedding.{} required for azure provider", key))
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            match self.request(&body).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let vectors = parse_embedding_response(&json)?;
                        if vectors.len() != texts.len() {
                            bail!(
                                "Embedding API returned {} vectors for {} inputs",
                                vectors.len(),
                                texts.len()
                            );
                        }
                        return Ok(vectors);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow::anyhow!(
                            "Embedding API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    bail!("Embedding API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }
}

/// Parse an embeddings response.
///
/// Extracts `data[].embedding`, ordered by each item's `index` when
/// present.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] (public API) |
/// | `"azure"` | [`OpenAIProvider`] (Azure deployment) |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" | "azure" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
