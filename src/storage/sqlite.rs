//! `SQLite` storage implementation.
//!
//! Provides the append-only event store using `SQLite` with schema
//! versioning and migration support.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use crate::error::{Result, StorageError};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use crate::storage::traits::{FileRecord, SessionRecord, Storage, StorageStats, StoredBatch};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Columns selected for [`StoredBatch`] rows.
const BATCH_COLUMNS: &str = "seq, batch_id, session_id, payload, payload_size, created_at";

/// Columns selected for [`SessionRecord`] rows.
const SESSION_COLUMNS: &str = r"
    s.session_id, s.file_id, s.created_at,
    (SELECT COUNT(*) FROM batches b WHERE b.session_id = s.session_id)
";

/// SQLite-based event store.
///
/// # Examples
///
/// ```no_run
/// use pusher_rs::storage::{SqliteStorage, Storage};
///
/// let mut storage = SqliteStorage::open("pusher-events.db").unwrap();
/// storage.init().unwrap();
/// ```
pub struct SqliteStorage {
    /// `SQLite` connection.
    conn: Connection,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

impl SqliteStorage {
    /// Opens or creates a `SQLite` database at the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the database file. Missing parent directories are
    ///   created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;

        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;

        // WAL keeps readers (status, replay) off the writer's back
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory `SQLite` database.
    ///
    /// Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;

        Ok(Self { conn, path: None })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Gets the current schema version.
    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;

        Ok(version.and_then(|v| v.parse().ok()))
    }

    /// Sets the schema version.
    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Counts rows of a table.
    fn count(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count as usize)
    }

    /// Returns current Unix timestamp.
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        file_id: row.get(0)?,
        book_id: row.get(1)?,
        path: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let batch_count: i64 = row.get(3)?;
    Ok(SessionRecord {
        session_id: row.get(0)?,
        file_id: row.get(1)?,
        created_at: row.get(2)?,
        batch_count: batch_count as usize,
    })
}

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<StoredBatch> {
    let payload_size: i64 = row.get(4)?;
    Ok(StoredBatch {
        seq: row.get(0)?,
        batch_id: row.get(1)?,
        session_id: row.get(2)?,
        payload: row.get(3)?,
        payload_size: payload_size as usize,
        created_at: row.get(5)?,
    })
}

impl Storage for SqliteStorage {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            // Fresh install - create schema
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(StorageError::from)?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        } else if let Some(current) = self.get_schema_version()?
            && current < CURRENT_SCHEMA_VERSION
        {
            let migrations = crate::storage::schema::get_migrations_from(current);
            for migration in migrations {
                self.conn
                    .execute_batch(migration.sql)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
            }
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        }

        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn reset(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            DELETE FROM batches;
            DELETE FROM sessions;
            DELETE FROM files;
        ",
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    // ==================== File Operations ====================

    fn find_file(&self, path: &str) -> Result<Option<FileRecord>> {
        let file = self
            .conn
            .query_row(
                "SELECT file_id, book_id, path, created_at FROM files WHERE path = ?",
                params![path],
                file_from_row,
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(file)
    }

    fn create_file(&mut self, path: &str, book_id: &str) -> Result<FileRecord> {
        let file = FileRecord {
            file_id: Uuid::new_v4().to_string(),
            book_id: book_id.to_string(),
            path: path.to_string(),
            created_at: Self::now(),
        };

        self.conn
            .execute(
                "INSERT INTO files (file_id, book_id, path, created_at) VALUES (?, ?, ?, ?)",
                params![file.file_id, file.book_id, file.path, file.created_at],
            )
            .map_err(StorageError::from)?;

        Ok(file)
    }

    // ==================== Session Operations ====================

    fn create_session(&mut self, file_id: &str) -> Result<SessionRecord> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM files WHERE file_id = ?)",
                params![file_id],
                |row| row.get(0),
            )
            .map_err(StorageError::from)?;
        if !exists {
            return Err(StorageError::FileNotFound {
                identifier: file_id.to_string(),
            }
            .into());
        }

        let session = SessionRecord {
            session_id: Uuid::new_v4().to_string(),
            file_id: file_id.to_string(),
            created_at: Self::now(),
            batch_count: 0,
        };

        self.conn
            .execute(
                "INSERT INTO sessions (session_id, file_id, created_at) VALUES (?, ?, ?)",
                params![session.session_id, session.file_id, session.created_at],
            )
            .map_err(StorageError::from)?;

        Ok(session)
    }

    fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let session = self
            .conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.session_id = ?"),
                params![session_id],
                session_from_row,
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(session)
    }

    fn list_sessions(&self, file_id: Option<&str>) -> Result<Vec<SessionRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions s
                 WHERE ?1 IS NULL OR s.file_id = ?1
                 ORDER BY s.created_at, s.rowid"
            ))
            .map_err(StorageError::from)?;

        let sessions = stmt
            .query_map(params![file_id], session_from_row)
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        Ok(sessions)
    }

    // ==================== Batch Operations ====================

    fn append_batch(&mut self, batch_id: &str, session_id: &str, payload: &str) -> Result<()> {
        if self.get_session(session_id)?.is_none() {
            return Err(StorageError::SessionNotFound {
                id: session_id.to_string(),
            }
            .into());
        }
        if self.get_batch(batch_id)?.is_some() {
            return Err(StorageError::DuplicateBatch {
                id: batch_id.to_string(),
            }
            .into());
        }

        self.conn
            .execute(
                r"
            INSERT INTO batches (batch_id, session_id, payload, payload_size, created_at)
            VALUES (?, ?, ?, ?, ?)
        ",
                params![
                    batch_id,
                    session_id,
                    payload,
                    payload.len() as i64,
                    Self::now()
                ],
            )
            .map_err(StorageError::from)?;

        Ok(())
    }

    fn list_batches(&self, session_id: &str) -> Result<Vec<StoredBatch>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {BATCH_COLUMNS} FROM batches WHERE session_id = ? ORDER BY seq"
            ))
            .map_err(StorageError::from)?;

        let batches = stmt
            .query_map(params![session_id], batch_from_row)
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        Ok(batches)
    }

    fn get_batch(&self, batch_id: &str) -> Result<Option<StoredBatch>> {
        let batch = self
            .conn
            .query_row(
                &format!("SELECT {BATCH_COLUMNS} FROM batches WHERE batch_id = ?"),
                params![batch_id],
                batch_from_row,
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(batch)
    }

    // ==================== Utility Operations ====================

    fn stats(&self) -> Result<StorageStats> {
        let total_size: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(SUM(payload_size), 0) FROM batches",
                [],
                |row| row.get(0),
            )
            .map_err(StorageError::from)?;

        let schema_version = self.get_schema_version()?.unwrap_or(0);

        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok().map(|m| m.len()));

        Ok(StorageStats {
            file_count: self.count("files")?,
            session_count: self.count("sessions")?,
            batch_count: self.count("batches")?,
            total_payload_size: total_size as usize,
            schema_version,
            db_size,
        })
    }
}
