//! Change detection.
//!
//! Scans the tracked tables for rows updated after the stored checkpoint,
//! resolves them into the aggregate IDs that need re-indexing, merges those
//! into the durable pending set and advances the checkpoint.

use std::collections::HashSet;
use std::sync::Arc;

use catalog_etl_repository::{CatalogSource, CheckpointStore, TrackedTable};
use catalog_etl_shared::EntityClass;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::retry::{with_retry, RetryPolicy};

/// Outcome of one detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub class: EntityClass,
    /// Checkpoint the scan started from.
    pub since: DateTime<Utc>,
    /// Checkpoint written at the end of the pass.
    pub checkpoint: DateTime<Utc>,
    /// Aggregate IDs found changed in this pass.
    pub changed: HashSet<String>,
}

/// Detects changed aggregates of one entity class.
pub struct ChangeDetector {
    source: Arc<dyn CatalogSource>,
    store: Arc<dyn CheckpointStore>,
    policy: RetryPolicy,
}

impl ChangeDetector {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        store: Arc<dyn CheckpointStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            source,
            store,
            policy,
        }
    }

    /// Run one detection pass for `class`.
    ///
    /// The pending additions are written before the checkpoint, so a failure
    /// at any point leaves the checkpoint where it was and the same window is
    /// scanned again on the next pass.
    #[instrument(skip(self), fields(class = %class))]
    pub async fn detect(&self, class: EntityClass) -> Result<DetectionReport, PipelineError> {
        let since = with_retry(&self.policy, "get_checkpoint", || {
            self.store.get_checkpoint(class)
        })
        .await?;

        let changed_ids: HashSet<Uuid> = match class {
            EntityClass::Films => self.changed_films(since).await?,
            EntityClass::Genres => self
                .changed_ids(TrackedTable::Genre, since)
                .await?
                .into_iter()
                .collect(),
            EntityClass::Persons => self
                .changed_ids(TrackedTable::Person, since)
                .await?
                .into_iter()
                .collect(),
        };
        let changed: HashSet<String> = changed_ids.iter().map(Uuid::to_string).collect();

        // Taken after the scans; rows committed in between are picked up by
        // nobody until they change again.
        let checkpoint = Utc::now();

        with_retry(&self.policy, "add_pending", || {
            self.store.add_pending(class, &changed)
        })
        .await?;
        with_retry(&self.policy, "set_checkpoint", || {
            self.store.set_checkpoint(class, checkpoint)
        })
        .await?;

        debug!(
            since = %since,
            checkpoint = %checkpoint,
            changed = changed.len(),
            "Detection pass complete"
        );

        Ok(DetectionReport {
            class,
            since,
            checkpoint,
            changed,
        })
    }

    async fn changed_ids(
        &self,
        table: TrackedTable,
        since: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, PipelineError> {
        let rows = with_retry(&self.policy, "changed_since", || {
            self.source.changed_since(table, since)
        })
        .await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    /// Films whose own row, a linked genre row or a linked person row changed.
    async fn changed_films(&self, since: DateTime<Utc>) -> Result<HashSet<Uuid>, PipelineError> {
        let films = self.changed_ids(TrackedTable::Film, since).await?;
        let genres = self.changed_ids(TrackedTable::Genre, since).await?;
        let persons = self.changed_ids(TrackedTable::Person, since).await?;

        let mut affected: HashSet<Uuid> = films.into_iter().collect();
        let direct = affected.len();

        if !genres.is_empty() {
            let linked = with_retry(&self.policy, "films_by_genres", || {
                self.source.films_by_genres(&genres)
            })
            .await?;
            affected.extend(linked);
        }

        if !persons.is_empty() {
            let linked = with_retry(&self.policy, "films_by_persons", || {
                self.source.films_by_persons(&persons)
            })
            .await?;
            affected.extend(linked);
        }

        debug!(
            direct,
            changed_genres = genres.len(),
            changed_persons = persons.len(),
            affected = affected.len(),
            "Resolved film changes"
        );
        Ok(affected)
    }
}
