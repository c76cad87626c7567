//! PostgreSQL implementation of the catalog source.
//!
//! Reads the five catalog tables (`film_work`, `genre`, `person`,
//! `genre_film_work`, `person_film_work`). Every value, including ID lists,
//! is bound as a query parameter.

mod catalog_source;

pub use catalog_source::PostgresCatalogSource;
