//! Index-ready document types.
//!
//! These are the shapes stored in the `movies`, `genres` and `persons`
//! indices and read back by the catalog API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `{id, name}` pair used for nested persons and genres.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: Uuid,
    pub name: String,
}

/// Document stored in the `movies` index.
///
/// Persons are projected by role twice: once as plain name lists for
/// full-text matching and once as `{id, name}` lists for nested queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDocument {
    pub id: Uuid,
    pub imdb_rating: Option<f64>,
    pub genre: Vec<String>,
    pub title: String,
    pub description: Option<String>,
    pub director: Vec<String>,
    pub actors_names: Vec<String>,
    pub writers_names: Vec<String>,
    pub actors: Vec<NamedRef>,
    pub writers: Vec<NamedRef>,
    pub directors: Vec<NamedRef>,
    pub genres: Vec<NamedRef>,
}

/// Document stored in the `genres` index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreDocument {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Document stored in the `persons` index. Its identity field is `uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDocument {
    pub uuid: Uuid,
    pub full_name: String,
    pub film_work_ids: Vec<Uuid>,
}

/// A transformed document of any class.
///
/// Serializes as the bare inner document so the JSON body matches the index
/// mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchDocument {
    Movie(MovieDocument),
    Genre(GenreDocument),
    Person(PersonDocument),
}

impl SearchDocument {
    /// Identity of the document in its index.
    pub fn document_id(&self) -> String {
        match self {
            Self::Movie(doc) => doc.id.to_string(),
            Self::Genre(doc) => doc.id.to_string(),
            Self::Person(doc) => doc.uuid.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::entity_class::EntityClass;

    #[test]
    fn test_person_document_serializes_identity_as_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let doc = SearchDocument::Person(PersonDocument {
            uuid: id,
            full_name: "Ann Lee".to_string(),
            film_work_ids: vec![],
        });

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["uuid"], "550e8400-e29b-41d4-a716-446655440000");
        assert!(json.get("Person").is_none());
        assert_eq!(doc.document_id(), id.to_string());
        assert_eq!(json[EntityClass::Persons.id_field()], doc.document_id());
    }

    #[test]
    fn test_genre_document_identity_matches_id_field() {
        let doc = SearchDocument::Genre(GenreDocument {
            id: Uuid::new_v4(),
            name: "Comedy".to_string(),
            description: Some("Funny".to_string()),
        });

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json[EntityClass::Genres.id_field()], doc.document_id());
        assert_eq!(json["description"], "Funny");
    }
}
