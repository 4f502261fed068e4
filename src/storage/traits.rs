//! Storage trait definition.
//!
//! Defines the interface for the append-only event store that receives
//! flushed batches, enabling pluggable storage implementations.

use crate::error::Result;
use serde::Serialize;

/// A watched document registered in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// File identifier.
    pub file_id: String,
    /// Collection the file belongs to.
    pub book_id: String,
    /// Document path.
    pub path: String,
    /// Unix timestamp of registration.
    pub created_at: i64,
}

/// A capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    /// Session identifier.
    pub session_id: String,
    /// File the session captures.
    pub file_id: String,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Number of batches stored for the session.
    pub batch_count: usize,
}

/// A stored batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredBatch {
    /// Arrival order within the store.
    pub seq: i64,
    /// Batch identifier.
    pub batch_id: String,
    /// Session the batch belongs to.
    pub session_id: String,
    /// Encoded payload.
    #[serde(skip)]
    pub payload: String,
    /// Payload size in bytes.
    pub payload_size: usize,
    /// Unix timestamp of arrival.
    pub created_at: i64,
}

/// Trait for event store backends.
///
/// Batches are append only: a batch is never updated, and appending a
/// batch identifier twice is an error.
pub trait Storage: Send {
    /// Initializes storage (creates schema, runs migrations).
    ///
    /// Should be idempotent - safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation or migration fails.
    fn init(&mut self) -> Result<()>;

    /// Checks if storage is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    fn is_initialized(&self) -> Result<bool>;

    /// Deletes all data but preserves the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn reset(&mut self) -> Result<()>;

    // ==================== File Operations ====================

    /// Looks up a file record by document path.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn find_file(&self, path: &str) -> Result<Option<FileRecord>>;

    /// Registers a document path and returns the new record.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (for example, a duplicate path).
    fn create_file(&mut self, path: &str, book_id: &str) -> Result<FileRecord>;

    /// Returns the record for `path`, registering it first if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or insert fails.
    fn find_or_create_file(&mut self, path: &str, book_id: &str) -> Result<FileRecord> {
        match self.find_file(path)? {
            Some(file) => Ok(file),
            None => self.create_file(path, book_id),
        }
    }

    // ==================== Session Operations ====================

    /// Opens a new capture session for a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or the insert fails.
    fn create_session(&mut self, file_id: &str) -> Result<SessionRecord>;

    /// Retrieves a session by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Lists sessions, optionally restricted to one file, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_sessions(&self, file_id: Option<&str>) -> Result<Vec<SessionRecord>>;

    // ==================== Batch Operations ====================

    /// Appends one encoded batch to a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist, the batch identifier
    /// was already used, or the insert fails.
    fn append_batch(&mut self, batch_id: &str, session_id: &str, payload: &str) -> Result<()>;

    /// Lists the batches of a session in arrival order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_batches(&self, session_id: &str) -> Result<Vec<StoredBatch>>;

    /// Retrieves a batch by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_batch(&self, batch_id: &str) -> Result<Option<StoredBatch>>;

    // ==================== Utility Operations ====================

    /// Gets storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    fn stats(&self) -> Result<StorageStats>;
}

/// Storage statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    /// Number of registered files.
    pub file_count: usize,
    /// Number of sessions.
    pub session_count: usize,
    /// Number of stored batches.
    pub batch_count: usize,
    /// Total size of all payloads in bytes.
    pub total_payload_size: usize,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}
