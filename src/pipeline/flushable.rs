//! Flushable buffer bound to a remote sink.
//!
//! A [`FlushableBuffer`] is a [`SerializedBuffer`] that can hand its content
//! to a [`RemoteSink`]. At most one flush is in flight per buffer; a failed
//! flush keeps the content so the next flush resends it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::encode_batch;
use crate::core::{EventRecord, SerializedBuffer};
use crate::error::{CodecError, Result, SinkError};
use crate::sink::RemoteSink;

/// Outcome of one flush attempt.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered; the sink was not called.
    Empty,
    /// Another flush is in flight; the sink was not called.
    InFlight,
    /// The sink stored the batch and its content was released.
    Flushed(FlushReport),
    /// The sink failed; the content is retained for the next flush.
    Retained {
        /// Identifier of the failed attempt.
        batch_id: String,
        /// Sink failure.
        error: SinkError,
    },
}

impl FlushOutcome {
    /// Returns `true` if the sink stored a batch.
    #[must_use]
    pub const fn is_flushed(&self) -> bool {
        matches!(self, Self::Flushed(_))
    }

    /// Returns `true` if the sink failed and content was retained.
    #[must_use]
    pub const fn is_retained(&self) -> bool {
        matches!(self, Self::Retained { .. })
    }
}

/// Details of a stored batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// Batch identifier passed to the sink.
    pub batch_id: String,
    /// Number of events in the batch.
    pub events: usize,
    /// Size of the buffered content in bytes.
    pub size: usize,
    /// Size of the encoded payload in bytes.
    pub payload_size: usize,
}

/// Clears the in-flight flag when dropped.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A [`SerializedBuffer`] bound to a remote sink.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use pusher_rs::pipeline::FlushableBuffer;
/// use pusher_rs::sink::MemorySink;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let sink = Arc::new(MemorySink::new());
/// let buffer = FlushableBuffer::new(sink.clone(), "session-1");
/// buffer.add_event("record").unwrap();
///
/// let outcome = buffer.flush().await.unwrap();
/// assert!(outcome.is_flushed());
/// assert_eq!(buffer.size(), 0);
/// assert_eq!(sink.writes().len(), 1);
/// # }
/// ```
pub struct FlushableBuffer {
    /// Buffered records.
    buffer: Mutex<SerializedBuffer>,
    /// Set while a sink write is outstanding.
    in_flight: AtomicBool,
    /// Destination of flushed batches.
    sink: Arc<dyn RemoteSink>,
    /// Session every batch is written under.
    session_id: String,
}

impl FlushableBuffer {
    /// Creates an empty buffer writing to `sink` under `session_id`.
    pub fn new(sink: Arc<dyn RemoteSink>, session_id: impl Into<String>) -> Self {
        Self {
            buffer: Mutex::new(SerializedBuffer::new()),
            in_flight: AtomicBool::new(false),
            sink,
            session_id: session_id.into(),
        }
    }

    /// Returns the session identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Serializes `event` and prepends it.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the event cannot be serialized.
    pub fn add_event<E: EventRecord + ?Sized>(
        &self,
        event: &E,
    ) -> std::result::Result<(), CodecError> {
        self.buffer.lock().add_event(event)
    }

    /// Prepends pre-serialized content.
    pub fn add_raw_content(&self, raw: &str) {
        self.buffer.lock().add_raw_content(raw);
    }

    /// Returns the buffered size in bytes.
    pub fn size(&self) -> usize {
        self.buffer.lock().size()
    }

    /// Returns the number of buffered events.
    pub fn count(&self) -> usize {
        self.buffer.lock().count()
    }

    /// Returns a copy of the buffered contents.
    pub fn contents(&self) -> String {
        self.buffer.lock().contents().to_string()
    }

    /// Returns `true` while a flush is in flight.
    pub fn is_flushing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Hands the buffered content to the sink.
    ///
    /// Content prepended while the write is outstanding is kept; on success
    /// only the flushed snapshot is released. A sink failure is reported as
    /// [`FlushOutcome::Retained`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the content cannot be encoded.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        let (contents, events) = {
            let buffer = self.buffer.lock();
            if buffer.is_empty() {
                return Ok(FlushOutcome::Empty);
            }
            if self.in_flight.swap(true, Ordering::AcqRel) {
                debug!(session_id = %self.session_id, "flush already in flight");
                return Ok(FlushOutcome::InFlight);
            }
            (buffer.contents().to_string(), buffer.count())
        };
        let _flight = FlightGuard(&self.in_flight);

        let payload = encode_batch(&contents)?;
        let batch_id = Uuid::new_v4().to_string();
        debug!(
            %batch_id,
            sink = self.sink.name(),
            events,
            size = contents.len(),
            payload_size = payload.len(),
            "flushing batch"
        );

        match self
            .sink
            .write_batch(&batch_id, &self.session_id, &payload)
            .await
        {
            Ok(()) => {
                self.buffer.lock().release_flushed(contents.len(), events);
                info!(%batch_id, events, payload_size = payload.len(), "batch flushed");
                Ok(FlushOutcome::Flushed(FlushReport {
                    batch_id,
                    events,
                    size: contents.len(),
                    payload_size: payload.len(),
                }))
            }
            Err(error) => {
                warn!(%batch_id, events, %error, "flush failed, batch retained for retry");
                Ok(FlushOutcome::Retained { batch_id, error })
            }
        }
    }
}

impl std::fmt::Debug for FlushableBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushableBuffer")
            .field("buffer", &*self.buffer.lock())
            .field("in_flight", &self.is_flushing())
            .field("sink", &self.sink.name())
            .field("session_id", &self.session_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_batch;
    use crate::sink::MemorySink;

    fn buffer_with(sink: &Arc<MemorySink>) -> FlushableBuffer {
        FlushableBuffer::new(Arc::clone(sink) as Arc<dyn RemoteSink>, "session")
    }

    #[tokio::test]
    async fn test_flush_empty_is_noop() {
        let sink = Arc::new(MemorySink::new());
        let buffer = buffer_with(&sink);

        assert_eq!(buffer.flush().await.unwrap(), FlushOutcome::Empty);
        assert_eq!(sink.attempts(), 0);
    }

    #[tokio::test]
    async fn test_flush_success_empties() {
        let sink = Arc::new(MemorySink::new());
        let buffer = buffer_with(&sink);
        buffer.add_event("e1").unwrap();
        buffer.add_event("e2").unwrap();

        let outcome = buffer.flush().await.unwrap();
        let FlushOutcome::Flushed(report) = outcome else {
            unreachable!("expected flushed outcome");
        };
        assert_eq!(report.events, 2);
        assert_eq!(buffer.size(), 0);
        assert_eq!(buffer.count(), 0);
        assert!(!buffer.is_flushing());

        let written = sink.writes();
        assert_eq!(written[0].session_id, "session");
        assert_eq!(written[0].batch_id, report.batch_id);
        assert_eq!(decode_batch(&written[0].payload).unwrap(), "e2\u{1e}e1");
    }

    #[tokio::test]
    async fn test_flush_failure_retains_content() {
        let sink = Arc::new(MemorySink::new());
        let buffer = buffer_with(&sink);
        buffer.add_event("e1").unwrap();
        let size_before = buffer.size();
        sink.fail_next(1);

        let outcome = buffer.flush().await.unwrap();
        assert!(outcome.is_retained());
        assert_eq!(buffer.size(), size_before);
        assert_eq!(buffer.count(), 1);
        assert!(!buffer.is_flushing());

        // The next flush resends the retained batch with anything added since.
        buffer.add_event("e2").unwrap();
        assert!(buffer.flush().await.unwrap().is_flushed());
        assert_eq!(sink.records().unwrap(), ["e1", "e2"]);
    }

    #[tokio::test]
    async fn test_fresh_batch_id_per_attempt() {
        let sink = Arc::new(MemorySink::new());
        let buffer = buffer_with(&sink);
        buffer.add_event("e1").unwrap();
        sink.fail_next(1);

        let FlushOutcome::Retained { batch_id: failed, .. } = buffer.flush().await.unwrap() else {
            unreachable!("expected retained outcome");
        };
        let FlushOutcome::Flushed(report) = buffer.flush().await.unwrap() else {
            unreachable!("expected flushed outcome");
        };
        assert_ne!(failed, report.batch_id);
    }

    #[tokio::test]
    async fn test_at_most_one_flight() {
        let sink = Arc::new(MemorySink::gated());
        let buffer = buffer_with(&sink);
        buffer.add_event("e1").unwrap();

        let (first, second) = tokio::join!(buffer.flush(), async {
            let outcome = buffer.flush().await;
            assert!(buffer.is_flushing());
            sink.release(1);
            outcome
        });

        assert!(first.unwrap().is_flushed());
        assert_eq!(second.unwrap(), FlushOutcome::InFlight);
        assert_eq!(sink.attempts(), 1);
        assert!(!buffer.is_flushing());
    }

    #[tokio::test]
    async fn test_content_added_during_flight_survives() {
        let sink = Arc::new(MemorySink::gated());
        let buffer = buffer_with(&sink);
        buffer.add_event("old").unwrap();

        let (outcome, ()) = tokio::join!(buffer.flush(), async {
            tokio::task::yield_now().await;
            buffer.add_event("new").unwrap();
            sink.release(1);
        });

        assert!(outcome.unwrap().is_flushed());
        assert_eq!(buffer.contents(), "new");
        assert_eq!(buffer.count(), 1);
        assert_eq!(sink.records().unwrap(), ["old"]);
    }

    #[tokio::test]
    async fn test_dropped_flush_clears_flag() {
        let sink = Arc::new(MemorySink::gated());
        let buffer = buffer_with(&sink);
        buffer.add_event("e1").unwrap();

        {
            let flush = buffer.flush();
            tokio::pin!(flush);
            assert!(poll_once(flush.as_mut()).await.is_none());
            assert!(buffer.is_flushing());
        }

        assert!(!buffer.is_flushing());
        assert_eq!(buffer.count(), 1);
    }

    /// Polls a future once, returning its output if it completed.
    async fn poll_once<F: std::future::Future + Unpin>(fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            out = fut => Some(out),
            () = std::future::ready(()) => None,
        }
    }
}
