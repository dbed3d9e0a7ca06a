//! Ingestion entry points.
//!
//! Opens the configured collection, reads the source CSV, and hands both to
//! [`travel_search_core::ingest::ingest`]. Re-running against an unchanged
//! file adds nothing; after a failed run, re-running resumes where the last
//! committed batch left off.

use anyhow::{Context, Result};

use travel_search_core::ingest::{ingest, IngestOptions, IngestReport};
use travel_search_core::store::Collection;

use crate::collection::open_collection;
use crate::config::Config;
use crate::source::CsvSource;
use crate::sqlite_store::SqliteCollection;

/// Ingest the configured CSV once and return the collection.
///
/// With `debug`, every batch is logged and the last stored metadata record
/// is printed.
pub async fn ingest_once(config: &Config, debug: bool) -> Result<SqliteCollection> {
    let collection = open_collection(config).await?;
    let report = ingest_into(&collection, config, debug, None).await?;
    if debug {
        print_sample(&report);
    }
    Ok(collection)
}

/// Ingest the configured CSV into `collection`.
///
/// `batch_size` overrides `ingest.batch_size` when given.
pub async fn ingest_into<C>(
    collection: &C,
    config: &Config,
    debug: bool,
    batch_size: Option<usize>,
) -> Result<IngestReport>
where
    C: Collection + ?Sized,
{
    let source = CsvSource::open(&config.source.csv_path)?;
    let headers = source.headers().to_vec();
    let opts = IngestOptions {
        batch_size: batch_size.unwrap_or(config.ingest.batch_size),
        file_name: config.source.file_name(),
        debug,
    };

    let report = ingest(collection, &headers, source.into_rows(), &opts)
        .await
        .with_context(|| format!("ingestion of {} failed", config.source.csv_path.display()))?;
    Ok(report)
}

/// CLI entry point: ingest and print a summary.
pub async fn run_ingest(config: &Config, debug: bool, batch_size: Option<usize>) -> Result<()> {
    let collection = open_collection(config).await?;
    let report = ingest_into(&collection, config, debug, batch_size).await?;
    let total = collection.count().await?;

    println!("ingest {}", config.collection.name);
    println!("  rows scanned: {}", report.scanned);
    println!("  already present: {}", report.skipped);
    println!("  records added: {}", report.added);
    println!("  batches: {}", report.batches);
    println!("  date fallbacks: {}", report.date_fallbacks);
    println!("  collection size: {}", total);
    if debug {
        print_sample(&report);
    }
    println!("ok");

    collection.pool().close().await;
    Ok(())
}

fn print_sample(report: &IngestReport) {
    if let Some(meta) = &report.last_metadata {
        match serde_json::to_string(meta) {
            Ok(json) => println!("  sample metadata: {}", json),
            Err(e) => tracing::warn!(error = %e, "could not render sample metadata"),
        }
    }
}
