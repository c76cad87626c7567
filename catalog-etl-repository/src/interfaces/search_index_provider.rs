//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch, etc.).

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::opensearch::IndexConfig;
use crate::types::{BatchOperationSummary, BulkDocument};

/// Abstracts the underlying search index implementation.
///
/// Implementations are injected into the index loader, which applies chunking
/// and retries on top of these single-request operations.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Create the index described by `config` if it does not exist yet.
    ///
    /// Idempotent: an index that already exists, including one created
    /// concurrently between the existence check and the create call, is
    /// success.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the index was created by this call
    /// * `Ok(false)` - If the index already existed
    /// * `Err(SearchIndexError)` - If the index could not be verified or created
    async fn ensure_index(&self, config: &IndexConfig) -> Result<bool, SearchIndexError>;

    /// Create-or-replace `documents` in `index` with a single bulk request.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document outcomes; rejected documents
    ///   are reported here, not as an `Err`
    /// * `Err(SearchIndexError)` - If the request as a whole failed
    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BulkDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError>;
}
