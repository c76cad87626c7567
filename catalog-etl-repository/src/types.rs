//! Request and response types for the repository interfaces.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::SearchIndexError;

/// A base table whose `updated_at` column is scanned for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedTable {
    Film,
    Genre,
    Person,
}

impl TrackedTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Film => "film_work",
            Self::Genre => "genre",
            Self::Person => "person",
        }
    }
}

/// A row that changed after a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedRow {
    pub id: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// A document ready for a bulk upsert, keyed by its index identity.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkDocument {
    /// Value used as the document `_id`.
    pub id: String,
    /// Document body.
    pub source: Value,
}

/// Result of a batch operation for a single document.
///
/// This struct represents the outcome of one document within a bulk request.
/// It indicates whether the operation succeeded and includes error details if
/// it failed.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The document's `_id`.
    pub document_id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<SearchIndexError>,
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// This struct provides a complete overview of a bulk request, including the total
/// number of documents processed, how many succeeded and failed, and detailed results
/// for each individual document. This allows callers to handle partial failures.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of documents in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each document.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from per-document results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}
