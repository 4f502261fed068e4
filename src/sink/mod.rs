//! Remote sinks for flushed batches.
//!
//! The flush pipeline talks to exactly one collaborator, a [`RemoteSink`].
//! Two implementations are provided:
//!
//! - **Store**: writes into the local `SQLite` event store
//! - **Memory**: keeps batches in memory (dry runs, tests)

pub mod memory;
pub mod store;
pub mod traits;

pub use memory::{MemorySink, WrittenBatch};
pub use store::StoreSink;
pub use traits::RemoteSink;
