//! Idempotent ingestion pipeline.
//!
//! Flow: header check → fetch existing ids → for each row, skip known ids,
//! normalize, buffer → submit full batches immediately → submit the final
//! partial batch.
//!
//! Ids are positional (`travel_<index>`), so re-running on an unchanged
//! source adds nothing. Batches are not transactional as a group: when
//! batch `k` fails, batches `0..k` stay committed and the next run resumes
//! by skipping their ids.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::{Cause, PipelineError};
use crate::models::{record_id, Metadata, NormalizedRecord, SourceRow};
use crate::normalize::{normalize_row, validate_headers};
use crate::store::Collection;

/// Default number of records per submitted batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Tunables for a single ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Records per call to [`Collection::upsert`]. Values below 1 are
    /// treated as 1.
    pub batch_size: usize,
    /// Copied into every record's `file_name` metadata.
    pub file_name: String,
    /// Log every submitted batch at info level.
    pub debug: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            file_name: String::new(),
            debug: false,
        }
    }
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Rows read from the source.
    pub scanned: usize,
    /// Rows skipped because their id was already stored.
    pub skipped: usize,
    /// Records submitted successfully.
    pub added: usize,
    /// Batches submitted successfully.
    pub batches: usize,
    /// Rows whose `CreateDate` fell back to `0`.
    pub date_fallbacks: usize,
    /// Metadata of the last record added, for inspection.
    pub last_metadata: Option<Metadata>,
}

/// Ingest `rows` into `collection`.
///
/// `headers` is the source header line; it is validated before anything is
/// read or written. Each item of `rows` is a row or the error raised while
/// reading it.
pub async fn ingest<C, I>(
    collection: &C,
    headers: &[String],
    rows: I,
    opts: &IngestOptions,
) -> Result<IngestReport, PipelineError>
where
    C: Collection + ?Sized,
    I: IntoIterator<Item = anyhow::Result<SourceRow>>,
{
    validate_headers(headers.iter().map(String::as_str))?;

    let existing: HashSet<String> = collection.ids().await.map_err(|e| {
        PipelineError::Ingestion {
            batch: 0,
            added_before: 0,
            cause: e.into(),
        }
    })?;
    debug!(
        collection = collection.name(),
        existing = existing.len(),
        "loaded existing ids"
    );

    let batch_size = opts.batch_size.max(1);
    let mut report = IngestReport::default();
    let mut batch: Vec<NormalizedRecord> = Vec::with_capacity(batch_size);

    for (index, row) in rows.into_iter().enumerate() {
        report.scanned += 1;
        let row = row.map_err(|e| PipelineError::Source {
            row: index,
            cause: Cause::from(e),
        })?;

        if existing.contains(&record_id(index)) {
            report.skipped += 1;
            continue;
        }

        let normalized = normalize_row(index, &row, &opts.file_name)?;
        if normalized.date_error.is_some() {
            report.date_fallbacks += 1;
        }
        batch.push(normalized.record);

        if batch.len() == batch_size {
            submit(collection, &mut batch, &mut report, opts.debug).await?;
        }
    }

    if !batch.is_empty() {
        submit(collection, &mut batch, &mut report, opts.debug).await?;
    }

    info!(
        collection = collection.name(),
        scanned = report.scanned,
        skipped = report.skipped,
        added = report.added,
        batches = report.batches,
        "ingestion finished"
    );
    Ok(report)
}

async fn submit<C>(
    collection: &C,
    batch: &mut Vec<NormalizedRecord>,
    report: &mut IngestReport,
    verbose: bool,
) -> Result<(), PipelineError>
where
    C: Collection + ?Sized,
{
    collection
        .upsert(batch)
        .await
        .map_err(|e| PipelineError::Ingestion {
            batch: report.batches,
            added_before: report.added,
            cause: e.into(),
        })?;

    report.batches += 1;
    report.added += batch.len();
    report.last_metadata = batch.last().map(|r| r.metadata.clone());
    if verbose {
        info!(
            batch = report.batches,
            size = batch.len(),
            first_id = batch.first().map(|r| r.id.as_str()).unwrap_or_default(),
            "batch submitted"
        );
    }
    batch.clear();
    Ok(())
}
