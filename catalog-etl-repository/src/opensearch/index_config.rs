//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the `movies`,
//! `genres` and `persons` indices read by the catalog API.

use catalog_etl_shared::EntityClass;
use serde_json::{json, Value};

/// Name and creation body of one search index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// The index name.
    pub name: String,
    /// Settings and mappings sent when the index has to be created.
    pub body: Value,
}

impl IndexConfig {
    /// Create a new index configuration.
    ///
    /// # Arguments
    ///
    /// * `name` - The index name
    /// * `body` - The `{"settings": .., "mappings": ..}` creation body
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Configuration of the index documents of `class` are written to.
    pub fn for_class(class: EntityClass) -> Self {
        match class {
            EntityClass::Films => Self::movies(),
            EntityClass::Genres => Self::genres(),
            EntityClass::Persons => Self::persons(),
        }
    }

    /// The `movies` index.
    ///
    /// Name lists are analyzed text for full-text matching; the `{id, name}`
    /// lists are nested so the API can filter films by person or genre ID.
    pub fn movies() -> Self {
        Self::new(
            EntityClass::Films.index_name(),
            json!({
                "settings": analysis_settings(),
                "mappings": {
                    "dynamic": "strict",
                    "properties": {
                        "id": { "type": "keyword" },
                        "imdb_rating": { "type": "float" },
                        "genre": { "type": "keyword" },
                        "title": {
                            "type": "text",
                            "analyzer": "ru_en",
                            "fields": { "raw": { "type": "keyword" } }
                        },
                        "description": { "type": "text", "analyzer": "ru_en" },
                        "director": { "type": "text", "analyzer": "ru_en" },
                        "actors_names": { "type": "text", "analyzer": "ru_en" },
                        "writers_names": { "type": "text", "analyzer": "ru_en" },
                        "actors": named_ref_mapping(),
                        "writers": named_ref_mapping(),
                        "directors": named_ref_mapping(),
                        "genres": named_ref_mapping()
                    }
                }
            }),
        )
    }

    /// The `genres` index.
    pub fn genres() -> Self {
        Self::new(
            EntityClass::Genres.index_name(),
            json!({
                "settings": analysis_settings(),
                "mappings": {
                    "dynamic": "strict",
                    "properties": {
                        "id": { "type": "keyword" },
                        "name": {
                            "type": "text",
                            "analyzer": "ru_en",
                            "fields": { "raw": { "type": "keyword" } }
                        },
                        "description": { "type": "text", "analyzer": "ru_en" }
                    }
                }
            }),
        )
    }

    /// The `persons` index. Its identity field is `uuid`.
    pub fn persons() -> Self {
        Self::new(
            EntityClass::Persons.index_name(),
            json!({
                "settings": analysis_settings(),
                "mappings": {
                    "dynamic": "strict",
                    "properties": {
                        "uuid": { "type": "keyword" },
                        "full_name": {
                            "type": "text",
                            "analyzer": "ru_en",
                            "fields": { "raw": { "type": "keyword" } }
                        },
                        "film_work_ids": { "type": "keyword" }
                    }
                }
            }),
        )
    }
}

fn named_ref_mapping() -> Value {
    json!({
        "type": "nested",
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "name": { "type": "text", "analyzer": "ru_en" }
        }
    })
}

/// Shared `ru_en` analyzer: lowercasing plus English and Russian stop words
/// and stemming.
fn analysis_settings() -> Value {
    json!({
        "refresh_interval": "1s",
        "analysis": {
            "filter": {
                "english_stop": { "type": "stop", "stopwords": "_english_" },
                "english_stemmer": { "type": "stemmer", "language": "english" },
                "english_possessive_stemmer": { "type": "stemmer", "language": "possessive_english" },
                "russian_stop": { "type": "stop", "stopwords": "_russian_" },
                "russian_stemmer": { "type": "stemmer", "language": "russian" }
            },
            "analyzer": {
                "ru_en": {
                    "tokenizer": "standard",
                    "filter": [
                        "lowercase",
                        "english_stop",
                        "english_stemmer",
                        "english_possessive_stemmer",
                        "russian_stop",
                        "russian_stemmer"
                    ]
                }
            }
        }
    })
}
