//! Relational source error types.

use std::time::Duration;

use thiserror::Error;

use super::Retryable;

/// SQLSTATE codes that indicate the server or the connection, not the query,
/// is at fault.
const TRANSIENT_SQLSTATES: &[&str] = &["40001", "40P01", "53300", "57P01", "57P02", "57P03"];

/// Errors from reading the relational source of truth.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Could not reach the database or the connection was lost.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A query did not complete in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The database rejected a query.
    #[error("Query error: {0}")]
    QueryError(String),

    /// A row could not be decoded into its aggregate type.
    #[error("Decode error: {0}")]
    DecodeError(String),
}

impl SourceError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeError(msg.into())
    }
}

impl Retryable for SourceError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Timeout(_))
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        Self::Timeout(format!("{} did not complete within {:?}", operation, after))
    }
}

impl From<sqlx::Error> for SourceError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::ConnectionError(err.to_string()),
            sqlx::Error::PoolTimedOut => Self::Timeout(err.to_string()),
            sqlx::Error::Database(db) => {
                let transient = db.code().is_some_and(|code| {
                    code.starts_with("08") || TRANSIENT_SQLSTATES.contains(&code.as_ref())
                });
                if transient {
                    Self::ConnectionError(err.to_string())
                } else {
                    Self::QueryError(err.to_string())
                }
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => Self::DecodeError(err.to_string()),
            _ => Self::QueryError(err.to_string()),
        }
    }
}
