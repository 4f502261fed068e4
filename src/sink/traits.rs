//! Remote sink trait definition.
//!
//! Defines the single collaborator the flush pipeline writes to, enabling
//! pluggable event store backends.

use crate::error::SinkError;
use async_trait::async_trait;

/// An append-only destination for encoded batches.
///
/// A write is idempotent by intent but not guaranteed idempotent: if the
/// acknowledgment of a successful write is lost, the pipeline retries the
/// same events under a new batch identifier.
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Returns a short name for logging.
    fn name(&self) -> &'static str;

    /// Writes one encoded batch.
    ///
    /// # Arguments
    ///
    /// * `batch_id` - Freshly minted identifier of this write attempt.
    /// * `session_id` - Identifier of the capture session.
    /// * `payload` - Opaque encoded batch.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the batch was not stored. The caller keeps
    /// the batch and retries it later.
    async fn write_batch(
        &self,
        batch_id: &str,
        session_id: &str,
        payload: &str,
    ) -> Result<(), SinkError>;
}
