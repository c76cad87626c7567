//! In-memory implementations of the repository traits for pipeline tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use catalog_etl::detector::ChangeDetector;
use catalog_etl::extractor::AggregateExtractor;
use catalog_etl::loader::{IndexLoader, LoaderConfig};
use catalog_etl::orchestrator::{Pipeline, PipelineConfig};
use catalog_etl::retry::RetryPolicy;
use catalog_etl_repository::{
    BatchOperationResult, BatchOperationSummary, BulkDocument, CatalogSource, ChangedRow,
    CheckpointError, CheckpointStore, IndexConfig, SearchIndexError, SearchIndexProvider,
    SourceError, TrackedTable,
};
use catalog_etl_shared::{
    EntityClass, FilmAggregate, GenreAggregate, GenreRef, PersonAggregate, PersonCredit,
    PersonRole,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

// ============================================================================
// Relational source
// ============================================================================

#[derive(Default)]
struct Tables {
    films: HashMap<Uuid, (String, DateTime<Utc>)>,
    genres: HashMap<Uuid, (String, DateTime<Utc>)>,
    persons: HashMap<Uuid, (String, DateTime<Utc>)>,
    film_genres: Vec<(Uuid, Uuid)>,
    film_persons: Vec<(Uuid, Uuid, PersonRole)>,
}

/// Catalog held in memory, with call counters and failure injection.
#[derive(Default)]
pub struct InMemoryCatalog {
    tables: Mutex<Tables>,
    pub link_queries: AtomicUsize,
    /// Every `changed_since` call fails with a connection error while set.
    pub scan_outage: Mutex<bool>,
    /// `fetch_*` for these IDs fails with a decode error.
    pub corrupt: Mutex<HashSet<Uuid>>,
}

impl InMemoryCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_film(&self, title: &str, updated_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.tables
            .lock()
            .unwrap()
            .films
            .insert(id, (title.to_string(), updated_at));
        id
    }

    pub fn add_genre(&self, name: &str, updated_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.tables
            .lock()
            .unwrap()
            .genres
            .insert(id, (name.to_string(), updated_at));
        id
    }

    pub fn add_person(&self, name: &str, updated_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.tables
            .lock()
            .unwrap()
            .persons
            .insert(id, (name.to_string(), updated_at));
        id
    }

    pub fn link_genre(&self, film: Uuid, genre: Uuid) {
        self.tables.lock().unwrap().film_genres.push((film, genre));
    }

    pub fn link_person(&self, film: Uuid, person: Uuid, role: PersonRole) {
        self.tables
            .lock()
            .unwrap()
            .film_persons
            .push((film, person, role));
    }

    pub fn delete_film(&self, film: Uuid) {
        let mut tables = self.tables.lock().unwrap();
        tables.films.remove(&film);
        tables.film_genres.retain(|(f, _)| *f != film);
        tables.film_persons.retain(|(f, _, _)| *f != film);
    }

    pub fn touch_film(&self, film: Uuid, updated_at: DateTime<Utc>) {
        if let Some(row) = self.tables.lock().unwrap().films.get_mut(&film) {
            row.1 = updated_at;
        }
    }
}

fn changed(rows: &HashMap<Uuid, (String, DateTime<Utc>)>, since: DateTime<Utc>) -> Vec<ChangedRow> {
    let mut changed: Vec<ChangedRow> = rows
        .iter()
        .filter(|(_, (_, updated_at))| *updated_at > since)
        .map(|(id, (_, updated_at))| ChangedRow {
            id: *id,
            updated_at: *updated_at,
        })
        .collect();
    changed.sort_by_key(|row| row.updated_at);
    changed
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn changed_since(
        &self,
        table: TrackedTable,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChangedRow>, SourceError> {
        if *self.scan_outage.lock().unwrap() {
            return Err(SourceError::connection("connection refused"));
        }
        let tables = self.tables.lock().unwrap();
        Ok(match table {
            TrackedTable::Film => changed(&tables.films, since),
            TrackedTable::Genre => changed(&tables.genres, since),
            TrackedTable::Person => changed(&tables.persons, since),
        })
    }

    async fn films_by_genres(&self, genre_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError> {
        self.link_queries.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        let films: HashSet<Uuid> = tables
            .film_genres
            .iter()
            .filter(|(_, genre)| genre_ids.contains(genre))
            .map(|(film, _)| *film)
            .collect();
        Ok(films.into_iter().collect())
    }

    async fn films_by_persons(&self, person_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError> {
        self.link_queries.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        let films: HashSet<Uuid> = tables
            .film_persons
            .iter()
            .filter(|(_, person, _)| person_ids.contains(person))
            .map(|(film, _, _)| *film)
            .collect();
        Ok(films.into_iter().collect())
    }

    async fn fetch_film(&self, id: Uuid) -> Result<Option<FilmAggregate>, SourceError> {
        if self.corrupt.lock().unwrap().contains(&id) {
            return Err(SourceError::decode("column rating: mismatched types"));
        }
        let tables = self.tables.lock().unwrap();
        let Some((title, updated_at)) = tables.films.get(&id) else {
            return Ok(None);
        };

        let genres = tables
            .film_genres
            .iter()
            .filter(|(film, _)| *film == id)
            .filter_map(|(_, genre)| {
                tables.genres.get(genre).map(|(name, _)| GenreRef {
                    id: *genre,
                    name: name.clone(),
                })
            })
            .collect();
        let persons = tables
            .film_persons
            .iter()
            .filter(|(film, _, _)| *film == id)
            .filter_map(|(_, person, role)| {
                tables.persons.get(person).map(|(name, _)| PersonCredit {
                    id: *person,
                    name: name.clone(),
                    role: *role,
                })
            })
            .collect();

        Ok(Some(FilmAggregate {
            id,
            title: title.clone(),
            description: None,
            rating: Some(7.0),
            file_path: None,
            kind: Some("movie".to_string()),
            creation_date: None,
            updated_at: *updated_at,
            genres,
            persons,
        }))
    }

    async fn fetch_genre(&self, id: Uuid) -> Result<Option<GenreAggregate>, SourceError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.genres.get(&id).map(|(name, _)| GenreAggregate {
            id,
            name: name.clone(),
            description: None,
        }))
    }

    async fn fetch_person(&self, id: Uuid) -> Result<Option<PersonAggregate>, SourceError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.persons.get(&id).map(|(name, _)| {
            let mut film_ids: Vec<Uuid> = tables
                .film_persons
                .iter()
                .filter(|(_, person, _)| *person == id)
                .map(|(film, _, _)| *film)
                .collect();
            film_ids.sort();
            film_ids.dedup();
            PersonAggregate {
                id,
                full_name: name.clone(),
                film_ids,
            }
        }))
    }
}

// ============================================================================
// Checkpoint store
// ============================================================================

#[derive(Default)]
pub struct InMemoryStore {
    checkpoints: Mutex<HashMap<EntityClass, DateTime<Utc>>>,
    pending: Mutex<HashMap<EntityClass, HashSet<String>>>,
    /// `set_checkpoint` fails with a command error while set.
    pub reject_checkpoint_writes: Mutex<bool>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn checkpoint(&self, class: EntityClass) -> Option<DateTime<Utc>> {
        self.checkpoints.lock().unwrap().get(&class).copied()
    }

    pub fn put_checkpoint(&self, class: EntityClass, at: DateTime<Utc>) {
        self.checkpoints.lock().unwrap().insert(class, at);
    }

    pub fn pending(&self, class: EntityClass) -> HashSet<String> {
        self.pending
            .lock()
            .unwrap()
            .get(&class)
            .cloned()
            .unwrap_or_default()
    }

    pub fn put_pending(&self, class: EntityClass, id: impl Into<String>) {
        self.pending
            .lock()
            .unwrap()
            .entry(class)
            .or_default()
            .insert(id.into());
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStore {
    async fn get_checkpoint(&self, class: EntityClass) -> Result<DateTime<Utc>, CheckpointError> {
        Ok(self
            .checkpoint(class)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
    }

    async fn set_checkpoint(
        &self,
        class: EntityClass,
        at: DateTime<Utc>,
    ) -> Result<(), CheckpointError> {
        if *self.reject_checkpoint_writes.lock().unwrap() {
            return Err(CheckpointError::command(
                "READONLY You can't write against a read only replica.",
            ));
        }
        self.put_checkpoint(class, at);
        Ok(())
    }

    async fn add_pending(
        &self,
        class: EntityClass,
        ids: &HashSet<String>,
    ) -> Result<(), CheckpointError> {
        self.pending
            .lock()
            .unwrap()
            .entry(class)
            .or_default()
            .extend(ids.iter().cloned());
        Ok(())
    }

    async fn remove_pending(
        &self,
        class: EntityClass,
        ids: &HashSet<String>,
    ) -> Result<(), CheckpointError> {
        if let Some(pending) = self.pending.lock().unwrap().get_mut(&class) {
            pending.retain(|id| !ids.contains(id));
        }
        Ok(())
    }

    async fn list_pending(&self, class: EntityClass) -> Result<HashSet<String>, CheckpointError> {
        Ok(self.pending(class))
    }
}

// ============================================================================
// Search index
// ============================================================================

/// Index that stores documents by `_id` and records every bulk request.
#[derive(Default)]
pub struct RecordingIndex {
    documents: Mutex<HashMap<String, HashMap<String, Value>>>,
    pub created: Mutex<Vec<String>>,
    pub ensure_calls: AtomicUsize,
    pub bulk_calls: AtomicUsize,
    /// Number of upcoming bulk requests that fail with a 503.
    pub unavailable_for: AtomicUsize,
    /// Documents with these IDs are rejected with a mapping error.
    pub rejected: Mutex<HashSet<String>>,
}

impl RecordingIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.documents
            .lock()
            .unwrap()
            .get(index)
            .and_then(|docs| docs.get(id).cloned())
    }

    pub fn count(&self, index: &str) -> usize {
        self.documents
            .lock()
            .unwrap()
            .get(index)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SearchIndexProvider for RecordingIndex {
    async fn ensure_index(&self, config: &IndexConfig) -> Result<bool, SearchIndexError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        let mut created = self.created.lock().unwrap();
        if created.contains(&config.name) {
            return Ok(false);
        }
        created.push(config.name.clone());
        Ok(true)
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BulkDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);

        let outage = self
            .unavailable_for
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if outage {
            return Err(SearchIndexError::from_status(
                503,
                "cluster unavailable",
                SearchIndexError::BulkIndexError,
            ));
        }

        let rejected = self.rejected.lock().unwrap().clone();
        let mut stored = self.documents.lock().unwrap();
        let target = stored.entry(index.to_string()).or_default();

        let results = documents
            .iter()
            .map(|doc| {
                if rejected.contains(&doc.id) {
                    return BatchOperationResult {
                        document_id: doc.id.clone(),
                        success: false,
                        error: Some(SearchIndexError::document_rejected(
                            doc.id.clone(),
                            "mapper_parsing_exception",
                        )),
                    };
                }
                target.insert(doc.id.clone(), doc.source.clone());
                BatchOperationResult {
                    document_id: doc.id.clone(),
                    success: true,
                    error: None,
                }
            })
            .collect();

        Ok(BatchOperationSummary::from_results(results))
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub fn test_policy() -> RetryPolicy {
    RetryPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_attempts: Some(2),
        call_timeout: Duration::from_secs(5),
    }
}

pub fn detector(catalog: &Arc<InMemoryCatalog>, store: &Arc<InMemoryStore>) -> ChangeDetector {
    ChangeDetector::new(catalog.clone(), store.clone(), test_policy())
}

pub fn pipeline(
    class: EntityClass,
    catalog: &Arc<InMemoryCatalog>,
    store: &Arc<InMemoryStore>,
    index: &Arc<RecordingIndex>,
    chunk_size: usize,
) -> Pipeline {
    pipeline_with_policy(class, catalog, store, index, chunk_size, test_policy())
}

pub fn pipeline_with_policy(
    class: EntityClass,
    catalog: &Arc<InMemoryCatalog>,
    store: &Arc<InMemoryStore>,
    index: &Arc<RecordingIndex>,
    chunk_size: usize,
    policy: RetryPolicy,
) -> Pipeline {
    Pipeline::new(
        PipelineConfig {
            class,
            check_interval: Duration::from_secs(60),
        },
        ChangeDetector::new(catalog.clone(), store.clone(), policy.clone()),
        AggregateExtractor::new(catalog.clone(), policy.clone(), 4),
        IndexLoader::with_config(index.clone(), LoaderConfig { chunk_size }, policy.clone()),
        store.clone(),
        policy,
    )
}

pub fn ids(ids: &[Uuid]) -> HashSet<String> {
    ids.iter().map(Uuid::to_string).collect()
}
