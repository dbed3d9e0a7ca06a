//! Error taxonomy for the ingestion and query pipeline.

use std::fmt;

use thiserror::Error;

/// Boxed collaborator failure carried as an error source.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source header lacks required columns. Raised before any write.
    #[error("source is missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// A row has no value for a required column.
    #[error("row {row} is missing required column '{column}'")]
    MissingField { row: usize, column: String },

    /// A source record could not be read.
    #[error("failed to read source row {row}")]
    Source {
        row: usize,
        #[source]
        cause: Cause,
    },

    /// Submitting a batch to the collection failed. Earlier batches stay
    /// committed; re-running skips them by id.
    #[error("ingestion failed on batch {batch} ({added_before} records already committed)")]
    Ingestion {
        batch: usize,
        added_before: usize,
        #[source]
        cause: Cause,
    },

    /// No record carries the requested store name.
    #[error("no record named '{name}'")]
    Lookup { name: String },

    /// A read or update against the collection failed.
    #[error("collection operation failed")]
    Store(#[source] Cause),

    /// The collection's distance metric has no defined similarity mapping.
    #[error("similarity is only defined for cosine collections, got '{0}'")]
    DistanceSpace(String),
}

impl PipelineError {
    pub(crate) fn store(err: anyhow::Error) -> Self {
        PipelineError::Store(err.into())
    }
}

/// A recoverable, single-field parse failure.
///
/// Produced by the normalizer when a value is malformed; the record keeps a
/// default for that field and ingestion continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowParseError {
    pub row: usize,
    pub field: &'static str,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for RowParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}: could not parse {} '{}': {}",
            self.row, self.field, self.value, self.reason
        )
    }
}

impl std::error::Error for RowParseError {}
