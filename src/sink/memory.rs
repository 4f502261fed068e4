//! In-memory sink implementation.
//!
//! Records every accepted batch in memory. Suitable for dry runs and tests:
//! failures can be injected and writes can be held open until released.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::trace;

use crate::codec::decode_records;
use crate::error::{CodecError, SinkError};
use crate::sink::traits::RemoteSink;

/// A batch accepted by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBatch {
    /// Batch identifier.
    pub batch_id: String,
    /// Session identifier.
    pub session_id: String,
    /// Encoded payload.
    pub payload: String,
}

/// In-memory implementation of [`RemoteSink`].
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Accepted batches in write order.
    writes: Mutex<Vec<WrittenBatch>>,
    /// Number of `write_batch` calls, including failed ones.
    attempts: AtomicUsize,
    /// Number of upcoming writes that will fail.
    pending_failures: AtomicUsize,
    /// When set, each write waits for a permit.
    gate: Option<Semaphore>,
}

impl MemorySink {
    /// Creates a sink that accepts every write immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink whose writes wait until [`release`](Self::release) is
    /// called, one permit per write.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Lets `n` held writes proceed. No effect on an ungated sink.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Makes the next `n` writes fail with [`SinkError::Unavailable`].
    pub fn fail_next(&self, n: usize) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    /// Returns the number of write attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Returns the accepted batches in write order.
    pub fn writes(&self) -> Vec<WrittenBatch> {
        self.writes.lock().clone()
    }

    /// Decodes every accepted batch and returns all records oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if a stored payload cannot be decoded.
    pub fn records(&self) -> Result<Vec<String>, CodecError> {
        let mut records = Vec::new();
        for batch in self.writes.lock().iter() {
            records.extend(decode_records(&batch.payload)?);
        }
        Ok(records)
    }

    /// Consumes one injected failure, if any is pending.
    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RemoteSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write_batch(
        &self,
        batch_id: &str,
        session_id: &str,
        payload: &str,
    ) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| SinkError::Unavailable(e.to_string()))?
                .forget();
        }

        if self.take_failure() {
            return Err(SinkError::Unavailable("injected failure".to_string()));
        }

        trace!(batch_id, session_id, bytes = payload.len(), "memory sink accepted batch");
        self.writes.lock().push(WrittenBatch {
            batch_id: batch_id.to_string(),
            session_id: session_id.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_batch;

    #[tokio::test]
    async fn test_memory_sink_records_writes() {
        let sink = MemorySink::new();
        let payload = encode_batch("b\u{1e}a").unwrap();
        sink.write_batch("1", "s", &payload).await.unwrap();

        assert_eq!(sink.attempts(), 1);
        assert_eq!(sink.writes()[0].batch_id, "1");
        assert_eq!(sink.records().unwrap(), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_memory_sink_injected_failures() {
        let sink = MemorySink::new();
        sink.fail_next(2);

        assert!(sink.write_batch("1", "s", "x").await.is_err());
        assert!(sink.write_batch("2", "s", "x").await.is_err());
        assert!(sink.write_batch("3", "s", "x").await.is_ok());
        assert_eq!(sink.attempts(), 3);
        assert_eq!(sink.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_gated_sink_waits_for_release() {
        let sink = MemorySink::gated();
        let (result, ()) = tokio::join!(sink.write_batch("1", "s", "x"), async {
            tokio::task::yield_now().await;
            assert!(sink.writes().is_empty());
            sink.release(1);
        });
        assert!(result.is_ok());
        assert_eq!(sink.writes().len(), 1);
    }
}
