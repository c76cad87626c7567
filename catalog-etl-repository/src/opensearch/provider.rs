//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkOperation, BulkOperations, BulkParts, OpenSearch,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::IndexConfig;
use crate::types::{BatchOperationResult, BatchOperationSummary, BulkDocument};

/// OpenSearch provider implementation.
///
/// Writes whole documents through the bulk API with `index` operations, so a
/// document is created when absent and replaced when present.
///
/// # Example
///
/// ```ignore
/// use catalog_etl_repository::opensearch::{IndexConfig, OpenSearchProvider};
/// let provider = OpenSearchProvider::new("http://localhost:9200", None, Duration::from_secs(30))?;
/// provider.ping().await?;
/// provider.ensure_index(&IndexConfig::movies()).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider for the specified URL.
    ///
    /// No request is sent; use [`OpenSearchProvider::ping`] to verify the
    /// cluster is reachable.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `credentials` - Optional `(username, password)` for basic auth
    /// * `timeout` - Per-request timeout applied by the transport
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If the URL is invalid or the transport cannot be built
    pub fn new(
        url: &str,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::validation(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(timeout);
        if let Some((username, password)) = credentials {
            builder = builder.auth(Credentials::Basic(username, password));
        }
        let transport = builder
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        info!(url = %url, "Created OpenSearch provider");

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    /// Check that the cluster answers.
    pub async fn ping(&self) -> Result<(), SearchIndexError> {
        let response = self.client.ping().send().await?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchIndexError::from_status(
                status.as_u16(),
                &body,
                SearchIndexError::connection,
            ));
        }
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[name]))
            .send()
            .await?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchIndexError::from_status(
                    status,
                    &body,
                    SearchIndexError::index_creation,
                ))
            }
        }
    }
}

/// Turn a bulk response body into per-document outcomes.
///
/// Items are matched to `documents` by position, as the bulk API answers in
/// request order. A document without a matching item is reported as failed.
pub(crate) fn parse_bulk_response(
    body: &Value,
    documents: &[BulkDocument],
) -> BatchOperationSummary {
    let items = body["items"].as_array().map(Vec::as_slice).unwrap_or(&[]);

    let results = documents
        .iter()
        .enumerate()
        .map(|(position, document)| {
            let Some(item) = items.get(position) else {
                return BatchOperationResult {
                    document_id: document.id.clone(),
                    success: false,
                    error: Some(SearchIndexError::parse(format!(
                        "bulk response has no item for document {}",
                        document.id
                    ))),
                };
            };

            // Each item is keyed by its action name: {"index": {...}}.
            let outcome = item
                .as_object()
                .and_then(|actions| actions.values().next())
                .unwrap_or(&Value::Null);
            let status = outcome["status"]
                .as_u64()
                .and_then(|status| u16::try_from(status).ok())
                .unwrap_or(0);

            if (200..300).contains(&status) && outcome.get("error").is_none() {
                BatchOperationResult {
                    document_id: document.id.clone(),
                    success: true,
                    error: None,
                }
            } else {
                let reason = match &outcome["error"] {
                    Value::Null => format!("unexpected item {}", outcome),
                    Value::String(reason) => reason.clone(),
                    err => format!(
                        "{}: {}",
                        err["type"].as_str().unwrap_or("error"),
                        err["reason"].as_str().unwrap_or_default()
                    ),
                };
                let id = document.id.clone();
                BatchOperationResult {
                    document_id: document.id.clone(),
                    success: false,
                    error: Some(SearchIndexError::from_status(status, &reason, |_| {
                        SearchIndexError::document_rejected(id, reason.clone())
                    })),
                }
            }
        })
        .collect();

    BatchOperationSummary::from_results(results)
}

/// Classify the response to an index create request.
///
/// `Ok(true)` when the index was created, `Ok(false)` when another writer
/// created it first.
pub(crate) fn parse_create_response(status: u16, body: &str) -> Result<bool, SearchIndexError> {
    if (200..300).contains(&status) {
        return Ok(true);
    }
    if status == 400 && body.contains("resource_already_exists_exception") {
        return Ok(false);
    }
    Err(SearchIndexError::from_status(
        status,
        body,
        SearchIndexError::index_creation,
    ))
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    /// Create the index if it does not exist.
    ///
    /// A 400 `resource_already_exists_exception` from the create call means
    /// another writer created the index in the meantime and is success.
    async fn ensure_index(&self, config: &IndexConfig) -> Result<bool, SearchIndexError> {
        if self.index_exists(&config.name).await? {
            debug!(index = %config.name, "Index already exists");
            return Ok(false);
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&config.name))
            .body(config.body.clone())
            .send()
            .await?;

        let status = response.status_code();
        let body = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };

        match parse_create_response(status.as_u16(), &body) {
            Ok(true) => {
                info!(index = %config.name, "Created index");
                Ok(true)
            }
            Ok(false) => {
                debug!(index = %config.name, "Index was created concurrently");
                Ok(false)
            }
            Err(err) => {
                error!(index = %config.name, status = %status, body = %body, "Index creation failed");
                Err(err)
            }
        }
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BulkDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let mut operations = BulkOperations::new();
        for document in documents {
            operations
                .push(BulkOperation::index(&document.source).id(&document.id))
                .map_err(|e| SearchIndexError::serialization(e.to_string()))?;
        }

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(vec![operations])
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(index = %index, status = %status, body = %body, "Bulk request failed");
            return Err(SearchIndexError::from_status(
                status.as_u16(),
                &body,
                SearchIndexError::bulk_index,
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = parse_bulk_response(&body, documents);
        if summary.failed > 0 {
            warn!(
                index = %index,
                total = summary.total,
                failed = summary.failed,
                "Bulk request partially rejected"
            );
        } else {
            debug!(index = %index, total = summary.total, "Bulk request applied");
        }
        Ok(summary)
    }
}
