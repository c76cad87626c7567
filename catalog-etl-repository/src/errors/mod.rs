//! Error types for the catalog ETL repository.
//!
//! One error enum per external system, plus the [`Retryable`] classification
//! the pipeline's retry helper relies on.

mod checkpoint_error;
mod search_index_error;
mod source_error;

use std::time::Duration;

pub use checkpoint_error::CheckpointError;
pub use search_index_error::SearchIndexError;
pub use source_error::SourceError;

/// Classification of a failure as transient (worth retrying with backoff) or
/// permanent.
pub trait Retryable: std::error::Error + Send + Sync + 'static {
    /// Whether the failure is an infrastructure hiccup that may succeed on retry.
    fn is_transient(&self) -> bool;

    /// Build the error reported when a call did not complete within `after`.
    fn timed_out(operation: &str, after: Duration) -> Self;
}
