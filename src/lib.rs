//! # Pusher
//!
//! Buffered capture of document edit events.
//!
//! Pusher accumulates edit events in memory, flushes them in compressed
//! batches to a remote sink and keeps accepting events while a flush is in
//! flight. Flushed batches land in a local append-only `SQLite` event store
//! that can be replayed in chronological order.
//!
//! ## Features
//!
//! - **Serialized Buffer**: newest-first record buffer with byte accounting
//! - **Flush Pipeline**: at most one flush in flight, overflow buffering,
//!   retained batches on sink failure
//! - **Transport Codec**: JSON-escaped, LZ4-compressed, URL-safe base64
//! - **Event Store**: files, sessions and batches with schema versioning

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod sink;
pub mod storage;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{EVENT_SEPARATOR, EditEvent, EventRecord, SerializedBuffer};

// Re-export pipeline types
pub use config::PipelineConfig;
pub use pipeline::{BufferController, BufferStatus, FlushOutcome, FlushableBuffer, RunSummary};

// Re-export sink and storage types
pub use sink::{MemorySink, RemoteSink, StoreSink};
pub use storage::{DEFAULT_DB_PATH, SqliteStorage, Storage};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
