//! Storage abstraction for Travel Search.
//!
//! The [`Collection`] trait is the boundary to the vector database. A
//! collection owns its embedding provider: it embeds record bodies on
//! [`upsert`](Collection::upsert) and the question on
//! [`query_by_text`](Collection::query_by_text), the way a Chroma collection
//! owns its `embedding_function`.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::DistanceSpace;
use crate::filter::Where;
use crate::models::{Metadata, NormalizedRecord};

/// A stored record as returned by [`Collection::get_by_filter`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub metadata: Metadata,
}

/// A raw nearest-neighbour candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCandidate {
    pub id: String,
    /// Distance under the collection's [`DistanceSpace`]; lower is closer.
    pub distance: f64,
    pub metadata: Metadata,
}

/// Abstract vector collection.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ids`](Collection::ids) | All ids currently stored |
/// | [`upsert`](Collection::upsert) | Embed and store a batch of records |
/// | [`get_by_filter`](Collection::get_by_filter) | Records whose metadata matches a predicate |
/// | [`update_metadata`](Collection::update_metadata) | Replace one record's metadata |
/// | [`query_by_text`](Collection::query_by_text) | Nearest neighbours of a question |
/// | [`count`](Collection::count) | Number of stored records |
#[async_trait]
pub trait Collection: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    /// Distance metric used by [`query_by_text`](Collection::query_by_text).
    fn space(&self) -> DistanceSpace;

    /// Ids of every stored record.
    async fn ids(&self) -> Result<HashSet<String>>;

    /// Embed and store `records`, replacing any record with the same id.
    ///
    /// A failure leaves none of this batch stored.
    async fn upsert(&self, records: &[NormalizedRecord]) -> Result<()>;

    /// Records matching `filter`; all records when `filter` is `None`.
    async fn get_by_filter(&self, filter: Option<&Where>) -> Result<Vec<StoredRecord>>;

    /// Replace the metadata of record `id` wholesale.
    ///
    /// Fails if `id` does not exist.
    async fn update_metadata(&self, id: &str, metadata: &Metadata) -> Result<()>;

    /// Embed `text` and return up to `n` candidates matching `filter`,
    /// ordered by ascending distance.
    async fn query_by_text(
        &self,
        text: &str,
        filter: Option<&Where>,
        n: usize,
    ) -> Result<Vec<QueryCandidate>>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;
}
