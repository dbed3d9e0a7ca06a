//! In-memory [`Collection`] implementation for tests and dry runs.
//!
//! Records live in a `BTreeMap` behind `std::sync::RwLock`. Search is a
//! brute-force scan computing the collection's distance against every
//! stored vector.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::{embed_one, DistanceSpace, EmbeddingProvider};
use crate::filter::Where;
use crate::models::{Metadata, NormalizedRecord};

use super::{Collection, QueryCandidate, StoredRecord};

struct StoredEntry {
    metadata: Metadata,
    vector: Vec<f32>,
}

/// In-memory vector collection.
pub struct InMemoryCollection {
    name: String,
    space: DistanceSpace,
    provider: Arc<dyn EmbeddingProvider>,
    entries: RwLock<BTreeMap<String, StoredEntry>>,
}

impl InMemoryCollection {
    pub fn new(
        name: impl Into<String>,
        space: DistanceSpace,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            space,
            provider,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, StoredEntry>>> {
        self.entries
            .read()
            .map_err(|_| anyhow!("collection '{}' lock poisoned", self.name))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, StoredEntry>>> {
        self.entries
            .write()
            .map_err(|_| anyhow!("collection '{}' lock poisoned", self.name))
    }
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn space(&self) -> DistanceSpace {
        self.space
    }

    async fn ids(&self) -> Result<HashSet<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    async fn upsert(&self, records: &[NormalizedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = records.iter().map(|r| r.body.clone()).collect();
        let vectors = self.provider.embed(&texts).await?;
        if vectors.len() != records.len() {
            bail!(
                "embedding provider returned {} vectors for {} texts",
                vectors.len(),
                records.len()
            );
        }

        let mut entries = self.write()?;
        for (record, vector) in records.iter().zip(vectors) {
            entries.insert(
                record.id.clone(),
                StoredEntry {
                    metadata: record.metadata.clone(),
                    vector,
                },
            );
        }
        Ok(())
    }

    async fn get_by_filter(&self, filter: Option<&Where>) -> Result<Vec<StoredRecord>> {
        let entries = self.read()?;
        Ok(entries
            .iter()
            .filter(|(_, e)| filter.map_or(true, |w| w.matches(&e.metadata)))
            .map(|(id, e)| StoredRecord {
                id: id.clone(),
                metadata: e.metadata.clone(),
            })
            .collect())
    }

    async fn update_metadata(&self, id: &str, metadata: &Metadata) -> Result<()> {
        let mut entries = self.write()?;
        match entries.get_mut(id) {
            Some(entry) => {
                entry.metadata = metadata.clone();
                Ok(())
            }
            None => bail!("no record with id '{}' in '{}'", id, self.name),
        }
    }

    async fn query_by_text(
        &self,
        text: &str,
        filter: Option<&Where>,
        n: usize,
    ) -> Result<Vec<QueryCandidate>> {
        let query_vec = embed_one(self.provider.as_ref(), text).await?;
        let entries = self.read()?;
        let mut candidates: Vec<QueryCandidate> = entries
            .iter()
            .filter(|(_, e)| filter.map_or(true, |w| w.matches(&e.metadata)))
            .map(|(id, e)| QueryCandidate {
                id: id.clone(),
                distance: self.space.distance(&query_vec, &e.vector),
                metadata: e.metadata.clone(),
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(n);
        Ok(candidates)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
