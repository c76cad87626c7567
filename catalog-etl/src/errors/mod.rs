//! Error types for the catalog ETL pipeline.

use thiserror::Error;

use catalog_etl_repository::{CheckpointError, Retryable, SearchIndexError, SourceError};

/// Errors that abort a single pipeline cycle.
///
/// The driver logs these and retries the whole cycle after the check
/// interval; none of them is fatal to the process.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Relational source failure.
    #[error("Source error: {0}")]
    SourceError(#[from] SourceError),

    /// Checkpoint store failure.
    #[error("Checkpoint error: {0}")]
    CheckpointError(#[from] CheckpointError),

    /// Search index failure.
    #[error("Search index error: {0}")]
    SearchIndexError(#[from] SearchIndexError),

    /// A document could not be turned into its wire form.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PipelineError {
    /// Whether the underlying failure was an infrastructure hiccup.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SourceError(e) => e.is_transient(),
            Self::CheckpointError(e) => e.is_transient(),
            Self::SearchIndexError(e) => e.is_transient(),
            Self::SerializationError(_) => false,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
