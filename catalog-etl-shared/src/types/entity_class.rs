//! Entity classes replicated by the ETL.
//!
//! Each class runs as its own pipeline with its own checkpoint, pending set
//! and target index, so pipelines never contend on shared keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An entity class tracked by the ETL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityClass {
    Films,
    Genres,
    Persons,
}

impl EntityClass {
    /// All classes, in the order pipelines are started.
    pub const ALL: [EntityClass; 3] = [Self::Films, Self::Genres, Self::Persons];

    /// Short lowercase name used in logs and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Films => "films",
            Self::Genres => "genres",
            Self::Persons => "persons",
        }
    }

    /// Key of the durable set holding aggregate IDs awaiting indexing.
    pub fn pending_key(&self) -> &'static str {
        match self {
            Self::Films => "films-pending",
            Self::Genres => "genres-pending",
            Self::Persons => "persons-pending",
        }
    }

    /// Key of the last-scan timestamp.
    pub fn checkpoint_key(&self) -> &'static str {
        match self {
            Self::Films => "films-last-checked",
            Self::Genres => "genres-last-checked",
            Self::Persons => "persons-last-checked",
        }
    }

    /// Name of the search index documents of this class are written to.
    pub fn index_name(&self) -> &'static str {
        match self {
            Self::Films => "movies",
            Self::Genres => "genres",
            Self::Persons => "persons",
        }
    }

    /// Field of the search document that carries its identity (`_id`).
    pub fn id_field(&self) -> &'static str {
        match self {
            Self::Films | Self::Genres => "id",
            Self::Persons => "uuid",
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "films" | "film" | "movies" => Ok(Self::Films),
            "genres" | "genre" => Ok(Self::Genres),
            "persons" | "person" => Ok(Self::Persons),
            other => Err(format!("unknown entity class '{}'", other)),
        }
    }
}
