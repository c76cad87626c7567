//! # Catalog ETL
//!
//! Incremental replication of the movie catalog from PostgreSQL into the
//! search index.
//!
//! ## Architecture
//!
//! Each entity class (films, genres, persons) runs its own polling pipeline:
//!
//! 1. **Detector**: Finds rows changed since the checkpoint and records the
//!    affected aggregate IDs in the durable pending set
//! 2. **Extractor**: Fetches full aggregates for pending IDs
//! 3. **Processor**: Transforms aggregates into search documents
//! 4. **Loader**: Writes documents into the index in bulk
//! 5. **Orchestrator**: Drives the pipelines and handles shutdown
//!
//! ## Modules
//!
//! - [`config`]: Settings and dependency initialization
//! - [`detector`]: Change detection and checkpointing
//! - [`extractor`]: Lazy aggregate extraction
//! - [`processor`]: Aggregate to document mapping
//! - [`loader`]: Index creation and bulk upserts
//! - [`orchestrator`]: Per-class pipeline driver and orchestrator
//! - [`retry`]: Backoff and timeouts around external calls
//! - [`errors`]: Error types for the pipeline

pub mod config;
pub mod detector;
pub mod errors;
pub mod extractor;
pub mod loader;
pub mod orchestrator;
pub mod processor;
pub mod retry;

pub use config::{Dependencies, Settings};
pub use errors::PipelineError;

use thiserror::Error;

/// Errors that can occur during ETL initialization or execution.
#[derive(Error, Debug)]
pub enum CatalogEtlError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A dependency could not be reached at startup.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] PipelineError),
}

impl CatalogEtlError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }
}
