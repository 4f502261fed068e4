//! Error types for pusher operations.
//!
//! This module provides the error hierarchy using `thiserror` for the
//! buffering pipeline, the transport codec, the event store, file I/O and
//! CLI commands.

use thiserror::Error;

/// Result type alias for pusher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for pusher operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Remote sink errors (batch writes).
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Serialization and transport encoding errors.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Buffer capacity errors.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Storage-related errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

impl Error {
    /// Returns `true` if event capture can continue after this error.
    ///
    /// Transient sink failures and overflow back-pressure are recoverable:
    /// buffered content is retained and the operation can be retried.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Sink(_) | Self::Buffer(BufferError::OverflowFull { .. }))
    }
}

/// Errors reported by a remote sink for a single batch write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink could not be reached (network, timeout, shutdown).
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// The write reached the sink but was refused.
    #[error("batch {batch_id} rejected: {reason}")]
    Rejected {
        /// Identifier of the refused batch.
        batch_id: String,
        /// Reason given by the sink.
        reason: String,
    },

    /// The write failed inside the sink.
    #[error("batch {batch_id} write failed: {reason}")]
    WriteFailed {
        /// Identifier of the failed batch.
        batch_id: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Serialization and transport encoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An event could not be serialized to a record.
    #[error("event serialization failed: {0}")]
    Serialization(String),

    /// An event serialized to an empty record.
    #[error("event serialized to an empty record")]
    EmptyRecord,

    /// A serialized record contains the reserved separator token.
    #[error("record contains the reserved separator at byte {offset}")]
    SeparatorInRecord {
        /// Byte offset of the first separator occurrence.
        offset: usize,
    },

    /// Malformed line in an event source.
    #[error("malformed event on line {line}: {reason}")]
    MalformedEvent {
        /// One-based line number.
        line: usize,
        /// Parser message.
        reason: String,
    },

    /// Payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(String),

    /// Payload failed to decompress.
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// Decoded payload is not valid UTF-8.
    #[error("invalid UTF-8 at byte offset {offset}")]
    InvalidUtf8 {
        /// Byte offset where invalid UTF-8 was found.
        offset: usize,
    },

    /// Decoded payload is not a valid escaped string.
    #[error("invalid escaped content: {0}")]
    Unescape(String),
}

/// Buffer capacity errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Accepting the event would grow overflow past its ceiling.
    #[error("overflow full: {size} bytes buffered, record of {record} bytes exceeds limit {limit}")]
    OverflowFull {
        /// Current overflow size in bytes.
        size: usize,
        /// Size of the rejected record in bytes.
        record: usize,
        /// Configured overflow limit in bytes.
        limit: usize,
    },
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage not initialized (init command not run).
    #[error("event store not initialized. Run: pusher init")]
    NotInitialized,

    /// File record not found.
    #[error("file not found: {identifier}")]
    FileNotFound {
        /// File ID or path that was not found.
        identifier: String,
    },

    /// Session not found.
    #[error("session not found: {id}")]
    SessionNotFound {
        /// Session ID that was not found.
        id: String,
    },

    /// Batch not found.
    #[error("batch not found: {id}")]
    BatchNotFound {
        /// Batch ID that was not found.
        id: String,
    },

    /// A batch with the same identifier was already appended.
    #[error("duplicate batch: {id}")]
    DuplicateBatch {
        /// Batch ID that already exists.
        id: String,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

// Implement From traits for standard library and dependency errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for CodecError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64(err.to_string())
    }
}

impl From<lz4_flex::block::DecompressError> for CodecError {
    fn from(err: lz4_flex::block::DecompressError) -> Self {
        Self::Decompress(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for CodecError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::InvalidUtf8 {
            offset: err.utf8_error().valid_up_to(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: Error = CommandError::ExecutionFailed("test error".to_string()).into();
        assert_eq!(
            err.to_string(),
            "command error: command execution failed: test error"
        );
    }

    #[test]
    fn test_sink_error_display() {
        let err = SinkError::WriteFailed {
            batch_id: "b-1".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "batch b-1 write failed: timeout");

        let err = SinkError::Unavailable("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::NotInitialized;
        assert_eq!(err.to_string(), "event store not initialized. Run: pusher init");

        let err = StorageError::DuplicateBatch {
            id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate batch: abc");
    }

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::SeparatorInRecord { offset: 3 };
        assert_eq!(
            err.to_string(),
            "record contains the reserved separator at byte 3"
        );

        let err = CodecError::MalformedEvent {
            line: 7,
            reason: "expected value".to_string(),
        };
        assert!(err.to_string().contains("line 7"));

        assert_eq!(
            CodecError::EmptyRecord.to_string(),
            "event serialized to an empty record"
        );
    }

    #[test]
    fn test_buffer_error_display() {
        let err = BufferError::OverflowFull {
            size: 90,
            record: 20,
            limit: 100,
        };
        assert!(err.to_string().contains("limit 100"));
    }

    #[test]
    fn test_recoverable_classification() {
        let err: Error = SinkError::Unavailable("down".to_string()).into();
        assert!(err.is_recoverable());

        let err: Error = BufferError::OverflowFull {
            size: 1,
            record: 1,
            limit: 1,
        }
        .into();
        assert!(err.is_recoverable());

        let err: Error = CodecError::SeparatorInRecord { offset: 0 }.into();
        assert!(!err.is_recoverable());

        let err: Error = StorageError::NotInitialized.into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_config() {
        let err = Error::Config {
            message: "bad config".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad config");
    }

    #[test]
    fn test_from_rusqlite_error_to_error() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: Error = rusqlite_err.into();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
    }

    #[test]
    fn test_from_serde_json_error_to_codec_error() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: CodecError = json_err.into();
        assert!(matches!(err, CodecError::Serialization(_)));
    }

    #[test]
    fn test_from_string_utf8_error_to_codec_error() {
        let invalid_bytes = vec![b'a', 0xff, 0xfe];
        let utf8_err = String::from_utf8(invalid_bytes).unwrap_err();
        let err: CodecError = utf8_err.into();
        assert_eq!(err, CodecError::InvalidUtf8 { offset: 1 });
    }
}
