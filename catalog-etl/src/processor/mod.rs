//! Processor module for the catalog ETL.
//!
//! Transforms extracted aggregates into search documents.

mod document_transformer;

pub use document_transformer::DocumentTransformer;
