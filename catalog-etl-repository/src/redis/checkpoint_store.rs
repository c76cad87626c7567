use std::collections::HashSet;

use async_trait::async_trait;
use catalog_etl_shared::EntityClass;
use chrono::{DateTime, SecondsFormat, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::errors::CheckpointError;
use crate::interfaces::CheckpointStore;

/// Format written by the legacy Python ETL: a JSON-quoted `str(datetime)`.
const LEGACY_CHECKPOINT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Encode a checkpoint for storage.
pub fn format_checkpoint(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored checkpoint.
///
/// Accepts RFC 3339 as well as the legacy `"2023-01-02 03:04:05.123456+00:00"`
/// form (with or without the surrounding JSON quotes), so a store populated by
/// the previous ETL can be reused as is.
pub fn parse_checkpoint(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim().trim_matches('"');
    DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| DateTime::parse_from_str(trimmed, LEGACY_CHECKPOINT_FORMAT))
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Redis-backed checkpoint store.
///
/// Uses a [`ConnectionManager`], which reconnects transparently after a
/// dropped connection; commands issued while disconnected fail with an I/O
/// error and are retried by the caller.
#[derive(Clone)]
pub struct RedisCheckpointStore {
    connection: ConnectionManager,
}

impl RedisCheckpointStore {
    /// Connect to the Redis server at `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self, CheckpointError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        info!(url = %url, "Connected to Redis");
        Ok(Self::new(connection))
    }

    /// Wrap an existing connection manager.
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl CheckpointStore for RedisCheckpointStore {
    async fn get_checkpoint(&self, class: EntityClass) -> Result<DateTime<Utc>, CheckpointError> {
        let key = class.checkpoint_key();
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(key).await?;

        match raw {
            None => {
                debug!(class = %class, "No checkpoint stored, starting from epoch");
                Ok(DateTime::<Utc>::UNIX_EPOCH)
            }
            Some(raw) => {
                parse_checkpoint(&raw).ok_or_else(|| CheckpointError::invalid_timestamp(key, raw))
            }
        }
    }

    async fn set_checkpoint(
        &self,
        class: EntityClass,
        at: DateTime<Utc>,
    ) -> Result<(), CheckpointError> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(class.checkpoint_key(), format_checkpoint(at))
            .await?;
        Ok(())
    }

    async fn add_pending(
        &self,
        class: EntityClass,
        ids: &HashSet<String>,
    ) -> Result<(), CheckpointError> {
        if ids.is_empty() {
            return Ok(());
        }
        let members: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut conn = self.connection.clone();
        let added: usize = conn.sadd(class.pending_key(), members).await?;

        debug!(class = %class, requested = ids.len(), added, "Added pending IDs");
        Ok(())
    }

    async fn remove_pending(
        &self,
        class: EntityClass,
        ids: &HashSet<String>,
    ) -> Result<(), CheckpointError> {
        if ids.is_empty() {
            return Ok(());
        }
        let members: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut conn = self.connection.clone();
        let removed: usize = conn.srem(class.pending_key(), members).await?;

        debug!(class = %class, requested = ids.len(), removed, "Removed pending IDs");
        Ok(())
    }

    async fn list_pending(&self, class: EntityClass) -> Result<HashSet<String>, CheckpointError> {
        let mut conn = self.connection.clone();
        let members: HashSet<String> = conn.smembers(class.pending_key()).await?;
        Ok(members)
    }
}
