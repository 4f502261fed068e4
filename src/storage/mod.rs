//! Event store layer for pusher.
//!
//! Provides the append-only event store backed by `SQLite`. The store
//! registers watched documents, opens capture sessions and keeps every
//! flushed batch in arrival order.

pub mod schema;
pub mod sqlite;
pub mod traits;

pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use sqlite::SqliteStorage;
pub use traits::{FileRecord, SessionRecord, Storage, StorageStats, StoredBatch};

/// Default database path relative to project root.
pub const DEFAULT_DB_PATH: &str = ".pusher/pusher-events.db";
