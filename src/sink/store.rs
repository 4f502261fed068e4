//! Event store sink.
//!
//! Adapts a [`Storage`] backend to the [`RemoteSink`] contract so the flush
//! pipeline can write batches straight into the local event store. Inserts
//! run on the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, SinkError, StorageError};
use crate::sink::traits::RemoteSink;
use crate::storage::Storage;

/// [`RemoteSink`] backed by a shared [`Storage`].
pub struct StoreSink<S: Storage> {
    storage: Arc<Mutex<S>>,
}

impl<S: Storage> StoreSink<S> {
    /// Creates a sink writing into `storage`.
    pub const fn new(storage: Arc<Mutex<S>>) -> Self {
        Self { storage }
    }

    /// Returns the shared storage handle.
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }
}

#[async_trait]
impl<S: Storage + 'static> RemoteSink for StoreSink<S> {
    fn name(&self) -> &'static str {
        "store"
    }

    async fn write_batch(
        &self,
        batch_id: &str,
        session_id: &str,
        payload: &str,
    ) -> Result<(), SinkError> {
        let storage = Arc::clone(&self.storage);
        let (id, session, body) = (
            batch_id.to_string(),
            session_id.to_string(),
            payload.to_string(),
        );
        let result = tokio::task::spawn_blocking(move || {
            storage.lock().append_batch(&id, &session, &body)
        })
        .await
        .map_err(|e| SinkError::WriteFailed {
            batch_id: batch_id.to_string(),
            reason: e.to_string(),
        })?;

        match result {
            Ok(()) => {
                debug!(batch_id, session_id, bytes = payload.len(), "batch stored");
                Ok(())
            }
            Err(Error::Storage(
                err @ (StorageError::DuplicateBatch { .. } | StorageError::SessionNotFound { .. }),
            )) => Err(SinkError::Rejected {
                batch_id: batch_id.to_string(),
                reason: err.to_string(),
            }),
            Err(err) => Err(SinkError::WriteFailed {
                batch_id: batch_id.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}
