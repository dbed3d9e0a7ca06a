//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that collections call to turn
//! text into vectors, plus pure helpers for vector serialization and the
//! distance functions behind each [`DistanceSpace`].
//!
//! Concrete providers (OpenAI, Azure OpenAI) live in the `travel-search`
//! app crate.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use async_trait::async_trait;

/// Trait for embedding providers.
///
/// `embed` receives a whole batch so that providers billed or rate-limited
/// per call see one request per ingestion batch.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed `texts`, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single text.
pub async fn embed_one(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let results = provider.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Distance metric of a collection (Chroma's `hnsw:space`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceSpace {
    /// `1 - cos(a, b)`, in `[0, 2]`.
    #[default]
    Cosine,
    /// Squared euclidean distance.
    L2,
    /// `1 - a·b`.
    InnerProduct,
}

impl DistanceSpace {
    pub fn as_str(self) -> &'static str {
        match self {
            DistanceSpace::Cosine => "cosine",
            DistanceSpace::L2 => "l2",
            DistanceSpace::InnerProduct => "ip",
        }
    }

    /// Distance between two vectors under this metric.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            DistanceSpace::Cosine => 1.0 - cosine_similarity(a, b) as f64,
            DistanceSpace::L2 => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| ((x - y) as f64).powi(2))
                .sum(),
            DistanceSpace::InnerProduct => {
                1.0 - a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x * y) as f64)
                    .sum::<f64>()
            }
        }
    }
}

impl fmt::Display for DistanceSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceSpace {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(DistanceSpace::Cosine),
            "l2" => Ok(DistanceSpace::L2),
            "ip" => Ok(DistanceSpace::InnerProduct),
            other => bail!("Unknown distance space: '{}'. Must be cosine, l2, or ip.", other),
        }
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use travel_search_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-magnitude input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
