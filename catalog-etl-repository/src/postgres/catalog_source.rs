use std::time::Duration;

use async_trait::async_trait;
use catalog_etl_shared::{FilmAggregate, GenreAggregate, GenreRef, PersonAggregate, PersonCredit};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, Postgres};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::SourceError;
use crate::interfaces::CatalogSource;
use crate::types::{ChangedRow, TrackedTable};

const FILMS_CHANGED_SINCE: &str = r#"
    SELECT id, updated_at FROM film_work
    WHERE updated_at > $1
    ORDER BY updated_at
"#;

const GENRES_CHANGED_SINCE: &str = r#"
    SELECT id, updated_at FROM genre
    WHERE updated_at > $1
    ORDER BY updated_at
"#;

const PERSONS_CHANGED_SINCE: &str = r#"
    SELECT id, updated_at FROM person
    WHERE updated_at > $1
    ORDER BY updated_at
"#;

const FILMS_BY_GENRES: &str = r#"
    SELECT DISTINCT fw.id
    FROM film_work fw
    JOIN genre_film_work gfw ON gfw.film_work_id = fw.id
    WHERE gfw.genre_id = ANY($1)
"#;

const FILMS_BY_PERSONS: &str = r#"
    SELECT DISTINCT fw.id
    FROM film_work fw
    JOIN person_film_work pfw ON pfw.film_work_id = fw.id
    WHERE pfw.person_id = ANY($1)
"#;

const FILM_AGGREGATE: &str = r#"
    SELECT
        fw.id,
        fw.title,
        fw.description,
        fw.rating::float8 AS rating,
        fw.file_path,
        fw.type::text AS kind,
        fw.creation_date,
        fw.updated_at,
        COALESCE(
            json_agg(
                DISTINCT jsonb_build_object('id', p.id, 'name', p.full_name, 'role', pfw.role)
            ) FILTER (WHERE p.id IS NOT NULL),
            '[]'
        ) AS persons,
        COALESCE(
            json_agg(
                DISTINCT jsonb_build_object('id', g.id, 'name', g.name)
            ) FILTER (WHERE g.id IS NOT NULL),
            '[]'
        ) AS genres
    FROM film_work fw
    LEFT JOIN person_film_work pfw ON pfw.film_work_id = fw.id
    LEFT JOIN person p ON p.id = pfw.person_id
    LEFT JOIN genre_film_work gfw ON gfw.film_work_id = fw.id
    LEFT JOIN genre g ON g.id = gfw.genre_id
    WHERE fw.id = $1
    GROUP BY fw.id
"#;

const GENRE_AGGREGATE: &str = r#"
    SELECT id, name, description FROM genre WHERE id = $1
"#;

const PERSON_AGGREGATE: &str = r#"
    SELECT
        p.id,
        p.full_name,
        COALESCE(
            array_agg(DISTINCT pfw.film_work_id) FILTER (WHERE pfw.film_work_id IS NOT NULL),
            '{}'
        ) AS film_ids
    FROM person p
    LEFT JOIN person_film_work pfw ON pfw.person_id = p.id
    WHERE p.id = $1
    GROUP BY p.id, p.full_name
"#;

#[derive(sqlx::FromRow)]
struct ChangedRowRecord {
    id: Uuid,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct FilmRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    rating: Option<f64>,
    file_path: Option<String>,
    kind: Option<String>,
    creation_date: Option<NaiveDate>,
    updated_at: DateTime<Utc>,
    persons: Json<Vec<PersonCredit>>,
    genres: Json<Vec<GenreRef>>,
}

#[derive(sqlx::FromRow)]
struct GenreRow {
    id: Uuid,
    name: String,
    description: Option<String>,
}

#[derive(sqlx::FromRow)]
struct PersonRow {
    id: Uuid,
    full_name: String,
    film_ids: Vec<Uuid>,
}

/// PostgreSQL-backed catalog source.
///
/// Holds a connection pool; each trait method issues exactly one query.
pub struct PostgresCatalogSource {
    pool: sqlx::PgPool,
}

impl PostgresCatalogSource {
    /// Wrap an existing pool.
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url` and verify it with one connection.
    ///
    /// # Arguments
    ///
    /// * `database_url` - PostgreSQL DSN
    /// * `max_connections` - Pool size
    /// * `acquire_timeout` - Bound on connecting or waiting for a pooled connection
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, SourceError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    async fn films_linked_by(&self, query: &str, ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let films: Vec<Uuid> = sqlx::query_scalar::<Postgres, Uuid>(query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        debug!(linked = ids.len(), films = films.len(), "Resolved linked films");
        Ok(films)
    }
}

#[async_trait]
impl CatalogSource for PostgresCatalogSource {
    async fn changed_since(
        &self,
        table: TrackedTable,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChangedRow>, SourceError> {
        let query = match table {
            TrackedTable::Film => FILMS_CHANGED_SINCE,
            TrackedTable::Genre => GENRES_CHANGED_SINCE,
            TrackedTable::Person => PERSONS_CHANGED_SINCE,
        };

        let rows = sqlx::query_as::<Postgres, ChangedRowRecord>(query)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        debug!(table = table.as_str(), changed = rows.len(), since = %since, "Scanned table");
        Ok(rows
            .into_iter()
            .map(|row| ChangedRow {
                id: row.id,
                updated_at: row.updated_at,
            })
            .collect())
    }

    async fn films_by_genres(&self, genre_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError> {
        self.films_linked_by(FILMS_BY_GENRES, genre_ids).await
    }

    async fn films_by_persons(&self, person_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError> {
        self.films_linked_by(FILMS_BY_PERSONS, person_ids).await
    }

    async fn fetch_film(&self, id: Uuid) -> Result<Option<FilmAggregate>, SourceError> {
        let row = sqlx::query_as::<Postgres, FilmRow>(FILM_AGGREGATE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| FilmAggregate {
            id: row.id,
            title: row.title,
            description: row.description,
            rating: row.rating,
            file_path: row.file_path,
            kind: row.kind,
            creation_date: row.creation_date,
            updated_at: row.updated_at,
            genres: row.genres.0,
            persons: row.persons.0,
        }))
    }

    async fn fetch_genre(&self, id: Uuid) -> Result<Option<GenreAggregate>, SourceError> {
        let row = sqlx::query_as::<Postgres, GenreRow>(GENRE_AGGREGATE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| GenreAggregate {
            id: row.id,
            name: row.name,
            description: row.description,
        }))
    }

    async fn fetch_person(&self, id: Uuid) -> Result<Option<PersonAggregate>, SourceError> {
        let row = sqlx::query_as::<Postgres, PersonRow>(PERSON_AGGREGATE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| PersonAggregate {
            id: row.id,
            full_name: row.full_name,
            film_ids: row.film_ids,
        }))
    }
}
