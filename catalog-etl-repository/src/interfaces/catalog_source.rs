//! Relational source trait definition.

use async_trait::async_trait;
use catalog_etl_shared::{Aggregate, EntityClass, FilmAggregate, GenreAggregate, PersonAggregate};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::SourceError;
use crate::types::{ChangedRow, TrackedTable};

/// Read-only access to the relational source of truth.
///
/// All methods are single queries; retries and timeouts are applied by the
/// caller. A missing row is a normal outcome (`Ok(None)`), not an error.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Rows of `table` with `updated_at` strictly after `since`, ordered by
    /// `updated_at`.
    async fn changed_since(
        &self,
        table: TrackedTable,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChangedRow>, SourceError>;

    /// Distinct IDs of films linked to any of `genre_ids`.
    ///
    /// Returns an empty list without querying when `genre_ids` is empty.
    async fn films_by_genres(&self, genre_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError>;

    /// Distinct IDs of films crediting any of `person_ids`.
    ///
    /// Returns an empty list without querying when `person_ids` is empty.
    async fn films_by_persons(&self, person_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError>;

    /// Full film aggregate with its linked genres and credited persons.
    async fn fetch_film(&self, id: Uuid) -> Result<Option<FilmAggregate>, SourceError>;

    async fn fetch_genre(&self, id: Uuid) -> Result<Option<GenreAggregate>, SourceError>;

    async fn fetch_person(&self, id: Uuid) -> Result<Option<PersonAggregate>, SourceError>;

    /// Fetch the aggregate of `class` rooted at `id`.
    async fn fetch_aggregate(
        &self,
        class: EntityClass,
        id: Uuid,
    ) -> Result<Option<Aggregate>, SourceError> {
        Ok(match class {
            EntityClass::Films => self.fetch_film(id).await?.map(Aggregate::Film),
            EntityClass::Genres => self.fetch_genre(id).await?.map(Aggregate::Genre),
            EntityClass::Persons => self.fetch_person(id).await?.map(Aggregate::Person),
        })
    }
}
