//! Search index error types.
//!
//! This module defines the unified error type for all search index operations,
//! covering both transport failures and per-document rejections.

use std::time::Duration;

use thiserror::Error;

use super::Retryable;

/// Unified errors from search index operations.
///
/// Used by the `SearchIndexProvider` trait for every backend call. Transport
/// level problems (connection refused, timeouts, overloaded cluster) are
/// reported as `ConnectionError` or `Timeout` and are retried by the caller;
/// everything else means the request itself was wrong and retrying it verbatim
/// would fail again.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., a document without its identity field).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the search index backend, or the backend is overloaded.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The backend did not answer in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Failed to create the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// The bulk request as a whole was rejected.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// A single document was rejected by the backend (mapping conflict,
    /// malformed field, ...).
    #[error("Document {document_id} rejected: {reason}")]
    DocumentRejected { document_id: String, reason: String },

    /// Failed to parse response from search index backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search index backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a document rejected error.
    pub fn document_rejected(document_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentRejected {
            document_id: document_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    ///
    /// 429 and 5xx mean the cluster is overloaded or unavailable and are
    /// reported as connection errors; `otherwise` builds the error for any
    /// other status.
    pub fn from_status(
        status: u16,
        body: &str,
        otherwise: impl FnOnce(String) -> SearchIndexError,
    ) -> Self {
        let msg = format!("status {}: {}", status, body);
        if status == 429 || status >= 500 {
            Self::ConnectionError(msg)
        } else {
            otherwise(msg)
        }
    }
}

impl Retryable for SearchIndexError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Timeout(_))
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        Self::Timeout(format!("{} did not complete within {:?}", operation, after))
    }
}

impl From<opensearch::Error> for SearchIndexError {
    fn from(err: opensearch::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        match err.status_code() {
            Some(status) => {
                Self::from_status(status.as_u16(), &err.to_string(), Self::BulkIndexError)
            }
            None => Self::ConnectionError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overload_statuses_are_transient() {
        for status in [429, 500, 502, 503, 504] {
            let err = SearchIndexError::from_status(status, "busy", SearchIndexError::bulk_index);
            assert!(err.is_transient(), "status {} should be transient", status);
        }
    }

    #[test]
    fn test_client_errors_are_permanent() {
        let err = SearchIndexError::from_status(400, "mapper_parsing_exception", |msg| {
            SearchIndexError::bulk_index(msg)
        });
        assert!(matches!(err, SearchIndexError::BulkIndexError(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_document_rejected_is_permanent() {
        let err = SearchIndexError::document_rejected("abc", "failed to parse field [imdb_rating]");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("abc"));
    }
}
