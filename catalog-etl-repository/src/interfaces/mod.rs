//! Interface definitions for the ETL's external systems.
//!
//! Each trait abstracts one backend so the pipeline receives its handles by
//! injection and tests can substitute in-memory implementations.

mod catalog_source;
mod checkpoint_store;
mod search_index_provider;

pub use catalog_source::CatalogSource;
pub use checkpoint_store::CheckpointStore;
pub use search_index_provider::SearchIndexProvider;
