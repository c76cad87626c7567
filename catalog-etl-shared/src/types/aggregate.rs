//! Aggregates extracted from the relational store.
//!
//! An aggregate is the unit of indexing. A film aggregate owns a snapshot of
//! its own row together with the current lists of linked genres and credited
//! persons, embedded by value rather than by reference.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a person plays on a film, as stored in the person link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonRole {
    Actor,
    Writer,
    Director,
    /// Any role the search document has no projection for.
    #[serde(other)]
    Other,
}

impl Default for PersonRole {
    fn default() -> Self {
        Self::Other
    }
}

/// A person credited on a film, embedded in the film aggregate.
///
/// A person with two roles on the same film appears as two credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonCredit {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub role: PersonRole,
}

/// A genre linked to a film, embedded in the film aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreRef {
    pub id: Uuid,
    pub name: String,
}

/// Denormalized film row with its linked genres and credited persons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmAggregate {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub file_path: Option<String>,
    pub kind: Option<String>,
    pub creation_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
    pub genres: Vec<GenreRef>,
    pub persons: Vec<PersonCredit>,
}

/// A genre row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreAggregate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// A person row with the IDs of every film the person is credited on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonAggregate {
    pub id: Uuid,
    pub full_name: String,
    pub film_ids: Vec<Uuid>,
}

/// Extracted aggregate, tagged by entity class.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    Film(FilmAggregate),
    Genre(GenreAggregate),
    Person(PersonAggregate),
}
