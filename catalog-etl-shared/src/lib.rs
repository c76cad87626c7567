//! # Catalog ETL Shared
//!
//! This crate defines the data structures passed between the stages of the
//! movie catalog ETL: the entity classes being replicated, the denormalized
//! aggregates read from the relational store, and the documents written to
//! the search index.

pub mod types;

pub use types::aggregate::{
    Aggregate, FilmAggregate, GenreAggregate, GenreRef, PersonAggregate, PersonCredit, PersonRole,
};
pub use types::entity_class::EntityClass;
pub use types::search_document::{
    GenreDocument, MovieDocument, NamedRef, PersonDocument, SearchDocument,
};
