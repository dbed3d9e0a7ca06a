//! Query entry points: filtered search and rename-then-search.
//!
//! The config-driven functions open the configured collection and return
//! display names only. The `*_in` variants take any [`Collection`] and
//! return full [`SearchHit`]s.

use anyhow::Result;
use chrono::NaiveDate;

use travel_search_core::filter::FilterSpec;
use travel_search_core::models::SearchHit;
use travel_search_core::normalize::date_to_timestamp;
use travel_search_core::patch;
use travel_search_core::search::{self, SearchParams};
use travel_search_core::store::Collection;

use crate::collection::open_collection;
use crate::config::{check_limit, check_threshold, Config};

/// Build a [`FilterSpec`] from CLI-style arguments. Empty slices and
/// `None` dates impose no constraint; both dates are inclusive.
pub fn build_filters(
    cities: &[String],
    store_types: &[String],
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> FilterSpec {
    FilterSpec::new()
        .cities(cities.iter().cloned())
        .store_types(store_types.iter().cloned())
        .date_range(
            start_date.map(date_to_timestamp),
            end_date.map(date_to_timestamp),
        )
}

/// Filtered search against `collection`.
pub async fn search_by_filters_in<C>(
    collection: &C,
    question: &str,
    filters: &FilterSpec,
    params: &SearchParams,
) -> Result<Vec<SearchHit>>
where
    C: Collection + ?Sized,
{
    Ok(search::search(collection, question, filters, params).await?)
}

/// Rename, then filtered search against `collection`.
pub async fn search_and_rename_in<C>(
    collection: &C,
    question: &str,
    store_name: &str,
    new_store_name: &str,
    filters: &FilterSpec,
    params: &SearchParams,
) -> Result<Vec<SearchHit>>
where
    C: Collection + ?Sized,
{
    Ok(patch::search_and_rename(
        collection,
        question,
        store_name,
        new_store_name,
        filters,
        params,
    )
    .await?)
}

/// Up to `retrieval.final_limit` store names matching `question` within
/// the given cities, types, and date range.
pub async fn search_by_filters(
    config: &Config,
    question: &str,
    cities: &[String],
    store_types: &[String],
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<Vec<String>> {
    let collection = open_collection(config).await?;
    let filters = build_filters(cities, store_types, start_date, end_date);
    let hits =
        search_by_filters_in(&collection, question, &filters, &config.retrieval.params()).await?;
    collection.pool().close().await;
    Ok(names(hits))
}

/// Rename `store_name` to `new_store_name`, then search within the given
/// cities and types. Renamed stores are listed under their new name.
pub async fn search_and_rename(
    config: &Config,
    question: &str,
    store_name: &str,
    new_store_name: &str,
    cities: &[String],
    store_types: &[String],
) -> Result<Vec<String>> {
    let collection = open_collection(config).await?;
    let filters = build_filters(cities, store_types, None, None);
    let hits = search_and_rename_in(
        &collection,
        question,
        store_name,
        new_store_name,
        &filters,
        &config.retrieval.params(),
    )
    .await?;
    collection.pool().close().await;
    Ok(names(hits))
}

fn names(hits: Vec<SearchHit>) -> Vec<String> {
    hits.into_iter().map(|h| h.name).collect()
}

/// Print hits the way the CLI shows them.
pub fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    for (i, hit) in hits.iter().enumerate() {
        if hit.name == hit.original_name {
            println!("{}. [{:.3}] {}", i + 1, hit.score, hit.name);
        } else {
            println!(
                "{}. [{:.3}] {} (was {})",
                i + 1,
                hit.score,
                hit.name,
                hit.original_name
            );
        }
    }
}

/// Overrides applied to the configured retrieval parameters.
#[derive(Debug, Clone, Default)]
pub struct ParamOverrides {
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
}

impl ParamOverrides {
    /// Apply the overrides, rejecting values the config would reject.
    pub fn apply(&self, mut params: SearchParams) -> Result<SearchParams> {
        if let Some(limit) = self.limit {
            check_limit("--limit", limit)?;
            params.limit = limit;
        }
        if let Some(threshold) = self.threshold {
            check_threshold("--threshold", threshold)?;
            params.threshold = threshold;
        }
        Ok(params)
    }
}

/// CLI entry point for `travel search`.
pub async fn run_search(
    config: &Config,
    question: &str,
    filters: &FilterSpec,
    overrides: &ParamOverrides,
) -> Result<()> {
    let params = overrides.apply(config.retrieval.params())?;
    let collection = open_collection(config).await?;
    let hits = search_by_filters_in(&collection, question, filters, &params).await?;
    print_hits(&hits);
    collection.pool().close().await;
    Ok(())
}

/// CLI entry point for `travel rename`.
pub async fn run_rename(
    config: &Config,
    question: &str,
    store_name: &str,
    new_store_name: &str,
    filters: &FilterSpec,
    overrides: &ParamOverrides,
) -> Result<()> {
    let params = overrides.apply(config.retrieval.params())?;
    let collection = open_collection(config).await?;
    let hits = search_and_rename_in(
        &collection,
        question,
        store_name,
        new_store_name,
        filters,
        &params,
    )
    .await?;
    print_hits(&hits);
    collection.pool().close().await;
    Ok(())
}
