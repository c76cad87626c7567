//! Aggregate extraction.
//!
//! Turns a list of pending IDs into a lazy stream of extraction outcomes, one
//! per ID, in input order. Up to `max_concurrency` fetches are in flight at a
//! time.

use std::sync::Arc;

use catalog_etl_repository::{CatalogSource, Retryable, SourceError};
use catalog_etl_shared::{Aggregate, EntityClass};
use futures::stream::{self, BoxStream, StreamExt};
use uuid::Uuid;

use crate::retry::{with_retry, RetryPolicy};

/// What happened to a single pending ID.
#[derive(Debug)]
pub enum ExtractOutcome {
    /// The aggregate was fetched.
    Found(Aggregate),
    /// The root row no longer exists.
    Vanished,
    /// The pending ID is not a valid aggregate key.
    InvalidId(String),
    /// The fetch failed; see [`ExtractOutcome::is_transient_failure`].
    Failed(SourceError),
}

impl ExtractOutcome {
    /// A failure that outlived the retry policy, as opposed to a data error
    /// confined to this one aggregate.
    pub fn is_transient_failure(&self) -> bool {
        matches!(self, Self::Failed(err) if err.is_transient())
    }
}

/// One item of the extraction stream.
#[derive(Debug)]
pub struct Extracted {
    pub id: String,
    pub outcome: ExtractOutcome,
}

/// Fetches full aggregates for pending IDs.
pub struct AggregateExtractor {
    source: Arc<dyn CatalogSource>,
    policy: RetryPolicy,
    max_concurrency: usize,
}

impl AggregateExtractor {
    pub fn new(source: Arc<dyn CatalogSource>, policy: RetryPolicy, max_concurrency: usize) -> Self {
        Self {
            source,
            policy,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Stream the aggregates of `class` for `ids`.
    ///
    /// Nothing is fetched until the stream is polled. A failure for one ID is
    /// reported in its item and does not end the stream.
    pub fn extract(&self, class: EntityClass, ids: Vec<String>) -> BoxStream<'_, Extracted> {
        stream::iter(ids)
            .map(move |id| self.extract_one(class, id))
            .buffered(self.max_concurrency)
            .boxed()
    }

    async fn extract_one(&self, class: EntityClass, id: String) -> Extracted {
        let key = match Uuid::parse_str(&id) {
            Ok(key) => key,
            Err(e) => {
                return Extracted {
                    outcome: ExtractOutcome::InvalidId(e.to_string()),
                    id,
                }
            }
        };

        let fetched = with_retry(&self.policy, "fetch_aggregate", || {
            self.source.fetch_aggregate(class, key)
        })
        .await;

        let outcome = match fetched {
            Ok(Some(aggregate)) => ExtractOutcome::Found(aggregate),
            Ok(None) => ExtractOutcome::Vanished,
            Err(err) => ExtractOutcome::Failed(err),
        };
        Extracted { id, outcome }
    }
}
