//! Metadata patch: rename a store, then search.
//!
//! A rename looks records up by exact `name`, copies their full metadata,
//! sets `new_store_name`, and writes the copy back as a wholesale
//! replacement. `name` itself is kept so later searches can still
//! deduplicate on it.
//!
//! [`search_and_rename`] never lets a failed rename stop the search: a
//! missing store or a collection error is logged and the search runs
//! against whatever is stored.

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::filter::{FilterSpec, MetaField, MetaValue, Where};
use crate::models::SearchHit;
use crate::search::{search, SearchParams};
use crate::store::Collection;

/// Ids of the records a rename touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameOutcome {
    pub updated: Vec<String>,
}

/// Set `new_store_name = new_name` on every record named `store_name`.
///
/// Returns [`PipelineError::Lookup`] when no record has that name.
pub async fn rename_store<C>(
    collection: &C,
    store_name: &str,
    new_name: &str,
) -> Result<RenameOutcome, PipelineError>
where
    C: Collection + ?Sized,
{
    let by_name = Where::Eq(MetaField::Name, MetaValue::from(store_name));
    let matches = collection
        .get_by_filter(Some(&by_name))
        .await
        .map_err(PipelineError::store)?;

    if matches.is_empty() {
        return Err(PipelineError::Lookup {
            name: store_name.to_string(),
        });
    }

    let mut outcome = RenameOutcome::default();
    for record in matches {
        let mut metadata = record.metadata.clone();
        metadata.new_store_name = Some(new_name.to_string());
        collection
            .update_metadata(&record.id, &metadata)
            .await
            .map_err(PipelineError::store)?;
        outcome.updated.push(record.id);
    }

    info!(
        store = store_name,
        new_name,
        updated = outcome.updated.len(),
        "store renamed"
    );
    Ok(outcome)
}

/// Rename `store_name` to `new_name`, then run [`search`].
///
/// Only the search can fail; rename errors are logged and swallowed.
pub async fn search_and_rename<C>(
    collection: &C,
    question: &str,
    store_name: &str,
    new_name: &str,
    filters: &FilterSpec,
    params: &SearchParams,
) -> Result<Vec<SearchHit>, PipelineError>
where
    C: Collection + ?Sized,
{
    if let Err(e) = rename_store(collection, store_name, new_name).await {
        warn!(store = store_name, error = %e, "rename skipped");
    }
    search(collection, question, filters, params).await
}
