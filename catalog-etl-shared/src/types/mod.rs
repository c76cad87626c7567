//! Core data structures shared across the ETL crates.
//!
//! - [`entity_class`]: the replicated entity classes and their store/index names
//! - [`aggregate`]: denormalized rows produced by the extractor
//! - [`search_document`]: index-ready documents produced by the transformer

pub mod aggregate;
pub mod entity_class;
pub mod search_document;

pub use aggregate::Aggregate;
pub use entity_class::EntityClass;
pub use search_document::SearchDocument;
