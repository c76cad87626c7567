//! Loader module for the catalog ETL.
//!
//! Creates the target indices on first use and writes documents in fixed-size
//! bulk requests.

use std::collections::HashSet;
use std::sync::Arc;

use catalog_etl_repository::{BulkDocument, IndexConfig, SearchIndexError, SearchIndexProvider};
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use crate::retry::{with_retry, RetryPolicy};

/// Configuration for the index loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of documents per bulk request.
    pub chunk_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { chunk_size: 100 }
    }
}

/// Per-call outcome of [`IndexLoader::bulk_upsert`].
#[derive(Debug, Default)]
pub struct LoadReport {
    /// IDs confirmed written.
    pub delivered: HashSet<String>,
    /// IDs not written, with the reason. Documents lacking their identity
    /// field are reported under an empty ID.
    pub failed: Vec<(String, SearchIndexError)>,
    /// Number of bulk requests issued.
    pub batches: usize,
    /// Whether any bulk request failed as a whole.
    pub batch_failed: bool,
}

/// Loader that indexes documents into the search engine.
pub struct IndexLoader {
    provider: Arc<dyn SearchIndexProvider>,
    config: LoaderConfig,
    policy: RetryPolicy,
}

impl IndexLoader {
    /// Create a new index loader with the default chunk size.
    pub fn new(provider: Arc<dyn SearchIndexProvider>, policy: RetryPolicy) -> Self {
        Self::with_config(provider, LoaderConfig::default(), policy)
    }

    /// Create a new index loader with custom configuration.
    pub fn with_config(
        provider: Arc<dyn SearchIndexProvider>,
        config: LoaderConfig,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            config: LoaderConfig {
                chunk_size: config.chunk_size.max(1),
            },
            policy,
        }
    }

    /// Create the index described by `config` unless it exists.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the index was created by this call
    /// * `Ok(false)` - If it already existed
    pub async fn ensure_index(&self, config: &IndexConfig) -> Result<bool, SearchIndexError> {
        with_retry(&self.policy, "ensure_index", || {
            self.provider.ensure_index(config)
        })
        .await
    }

    /// Upsert `documents` into `index`, keyed by their `id_field` value.
    ///
    /// Documents are split into chunks of the configured size and each chunk
    /// is one bulk request. A chunk that fails as a whole marks its documents
    /// failed and loading continues with the next chunk.
    #[instrument(skip(self, documents), fields(document_count = documents.len()))]
    pub async fn bulk_upsert(&self, index: &str, documents: Vec<Value>, id_field: &str) -> LoadReport {
        let mut report = LoadReport::default();

        let mut keyed = Vec::with_capacity(documents.len());
        for source in documents {
            match document_key(&source, id_field) {
                Some(id) => keyed.push(BulkDocument { id, source }),
                None => {
                    error!(index = %index, id_field = %id_field, "Document has no identity field");
                    report.failed.push((
                        String::new(),
                        SearchIndexError::validation(format!("missing `{}` field", id_field)),
                    ));
                }
            }
        }

        for chunk in keyed.chunks(self.config.chunk_size) {
            report.batches += 1;
            debug!(index = %index, batch = report.batches, size = chunk.len(), "Writing batch");

            let result = with_retry(&self.policy, "bulk_upsert", || {
                self.provider.bulk_upsert(index, chunk)
            })
            .await;

            match result {
                Ok(summary) => {
                    for outcome in summary.results {
                        if outcome.success {
                            report.delivered.insert(outcome.document_id);
                        } else {
                            let err = outcome.error.unwrap_or_else(|| {
                                SearchIndexError::bulk_index("rejected without reason")
                            });
                            warn!(
                                index = %index,
                                document_id = %outcome.document_id,
                                error = %err,
                                "Document rejected"
                            );
                            report.failed.push((outcome.document_id, err));
                        }
                    }
                }
                Err(err) => {
                    error!(
                        index = %index,
                        batch = report.batches,
                        size = chunk.len(),
                        error = %err,
                        "Bulk request failed"
                    );
                    report.batch_failed = true;
                    report
                        .failed
                        .extend(chunk.iter().map(|doc| (doc.id.clone(), err.clone())));
                }
            }
        }

        report
    }
}

/// The `_id` for a document: its `id_field` value as a string.
fn document_key(source: &Value, id_field: &str) -> Option<String> {
    match source.get(id_field)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_etl_repository::{BatchOperationResult, BatchOperationSummary};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock search provider recording bulk request sizes.
    struct MockSearchProvider {
        batch_sizes: Mutex<Vec<usize>>,
        fail_batch: Option<usize>,
        reject_id: Option<String>,
    }

    impl MockSearchProvider {
        fn new() -> Self {
            Self {
                batch_sizes: Mutex::new(Vec::new()),
                fail_batch: None,
                reject_id: None,
            }
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockSearchProvider {
        async fn ensure_index(&self, _config: &IndexConfig) -> Result<bool, SearchIndexError> {
            Ok(false)
        }

        async fn bulk_upsert(
            &self,
            _index: &str,
            documents: &[BulkDocument],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            let batch = {
                let mut sizes = self.batch_sizes.lock().unwrap();
                sizes.push(documents.len());
                sizes.len()
            };
            if self.fail_batch == Some(batch) {
                return Err(SearchIndexError::bulk_index("status 400: bad request"));
            }

            Ok(BatchOperationSummary::from_results(
                documents
                    .iter()
                    .map(|doc| {
                        let rejected = self.reject_id.as_deref() == Some(doc.id.as_str());
                        BatchOperationResult {
                            document_id: doc.id.clone(),
                            success: !rejected,
                            error: rejected.then(|| {
                                SearchIndexError::document_rejected(doc.id.clone(), "mapping")
                            }),
                        }
                    })
                    .collect(),
            ))
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            max_attempts: Some(2),
            call_timeout: Duration::from_secs(1),
        }
    }

    fn documents(count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| json!({ "id": format!("doc-{}", i), "title": "x" }))
            .collect()
    }

    #[tokio::test]
    async fn test_chunks_250_documents_into_three_batches() {
        let provider = Arc::new(MockSearchProvider::new());
        let loader = IndexLoader::with_config(
            provider.clone(),
            LoaderConfig { chunk_size: 100 },
            policy(),
        );

        let report = loader.bulk_upsert("movies", documents(250), "id").await;

        assert_eq!(*provider.batch_sizes.lock().unwrap(), vec![100, 100, 50]);
        assert_eq!(report.batches, 3);
        assert_eq!(report.delivered.len(), 250);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_later_batches() {
        let provider = Arc::new(MockSearchProvider {
            fail_batch: Some(1),
            ..MockSearchProvider::new()
        });
        let loader =
            IndexLoader::with_config(provider.clone(), LoaderConfig { chunk_size: 2 }, policy());

        let report = loader.bulk_upsert("movies", documents(5), "id").await;

        assert_eq!(report.batches, 3);
        assert!(report.batch_failed);
        assert_eq!(report.delivered.len(), 3);
        assert!(!report.delivered.contains("doc-0"));
        assert!(!report.delivered.contains("doc-1"));
        assert_eq!(report.failed.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_document_is_reported() {
        let provider = Arc::new(MockSearchProvider {
            reject_id: Some("doc-1".to_string()),
            ..MockSearchProvider::new()
        });
        let loader = IndexLoader::new(provider, policy());

        let report = loader.bulk_upsert("movies", documents(3), "id").await;

        assert!(!report.batch_failed);
        assert_eq!(report.delivered.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "doc-1");
        assert!(matches!(
            report.failed[0].1,
            SearchIndexError::DocumentRejected { .. }
        ));
    }

    #[tokio::test]
    async fn test_identity_field_is_configurable() {
        let provider = Arc::new(MockSearchProvider::new());
        let loader = IndexLoader::new(provider, policy());

        let report = loader
            .bulk_upsert(
                "persons",
                vec![json!({ "uuid": "p-1", "full_name": "Ann" }), json!({ "full_name": "Nobody" })],
                "uuid",
            )
            .await;

        assert!(report.delivered.contains("p-1"));
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            report.failed[0].1,
            SearchIndexError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_input_issues_no_requests() {
        let provider = Arc::new(MockSearchProvider::new());
        let loader = IndexLoader::new(provider.clone(), policy());

        let report = loader.bulk_upsert("genres", Vec::new(), "id").await;

        assert_eq!(report.batches, 0);
        assert!(provider.batch_sizes.lock().unwrap().is_empty());
    }
}
