//! Redis implementation of the checkpoint store.
//!
//! Checkpoints are plain string keys holding RFC 3339 timestamps; pending IDs
//! are Redis sets, so unions and removals are atomic on the server.

mod checkpoint_store;

pub use checkpoint_store::{format_checkpoint, parse_checkpoint, RedisCheckpointStore};
