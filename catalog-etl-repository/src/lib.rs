//! # Catalog ETL Repository
//!
//! This crate provides the traits and implementations the ETL uses to talk to
//! its three external systems: the relational source of truth, the durable
//! checkpoint/pending store, and the search index. It includes definitions for
//! errors, interfaces, and concrete implementations for PostgreSQL, Redis and
//! OpenSearch.

pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod postgres;
pub mod redis;
pub mod types;

pub use errors::{CheckpointError, Retryable, SearchIndexError, SourceError};
pub use interfaces::{CatalogSource, CheckpointStore, SearchIndexProvider};
pub use opensearch::{IndexConfig, OpenSearchProvider};
pub use postgres::PostgresCatalogSource;
pub use redis::RedisCheckpointStore;
pub use types::{
    BatchOperationResult, BatchOperationSummary, BulkDocument, ChangedRow, TrackedTable,
};
