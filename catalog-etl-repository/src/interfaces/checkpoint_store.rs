//! Checkpoint store trait definition.

use std::collections::HashSet;

use async_trait::async_trait;
use catalog_etl_shared::EntityClass;
use chrono::{DateTime, Utc};

use crate::errors::CheckpointError;

/// Durable per-class state: the last scan timestamp and the set of aggregate
/// IDs awaiting (re-)indexing.
///
/// Every operation is idempotent under retry. Implementations must apply
/// `add_pending` as a server-side set union (never read-modify-write from the
/// client) so that concurrent writers cannot lose IDs.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last successful scan time, or the Unix epoch if none was ever stored.
    async fn get_checkpoint(&self, class: EntityClass) -> Result<DateTime<Utc>, CheckpointError>;

    async fn set_checkpoint(
        &self,
        class: EntityClass,
        at: DateTime<Utc>,
    ) -> Result<(), CheckpointError>;

    /// Union `ids` into the pending set. Already present IDs are a no-op.
    async fn add_pending(
        &self,
        class: EntityClass,
        ids: &HashSet<String>,
    ) -> Result<(), CheckpointError>;

    /// Remove `ids` from the pending set. Absent IDs are a no-op.
    async fn remove_pending(
        &self,
        class: EntityClass,
        ids: &HashSet<String>,
    ) -> Result<(), CheckpointError>;

    async fn list_pending(&self, class: EntityClass) -> Result<HashSet<String>, CheckpointError>;
}
