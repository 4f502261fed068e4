//! Buffer controller.
//!
//! The [`BufferController`] owns a primary [`FlushableBuffer`] and an
//! overflow [`SerializedBuffer`]. Events go to primary while it is below the
//! flush threshold. Once primary reaches the threshold, or while a flush is
//! in flight, events go to overflow; the event that finds primary full also
//! starts a flush, and when that flush settles overflow is merged back into
//! primary.
//!
//! Lock order is overflow, then primary. Routing and merging both happen
//! under the overflow lock, so a merge left pending by a racing flush is
//! settled before any newer event reaches primary.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::core::buffer::check_record;
use crate::core::{EventRecord, SerializedBuffer};
use crate::error::{BufferError, Result};
use crate::pipeline::flushable::{FlushOutcome, FlushableBuffer};
use crate::pipeline::status::{BufferStatus, StatusSink};

/// Buffer an event was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Primary was below its threshold.
    Primary,
    /// Primary was full or flushing.
    Overflow,
}

/// Result of [`BufferController::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    /// Where the event was buffered.
    pub route: Route,
    /// The flush this event triggered, if any.
    pub flush: Option<FlushOutcome>,
}

/// Routes events between a primary and an overflow buffer.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use pusher_rs::config::PipelineConfig;
/// use pusher_rs::pipeline::{BufferController, FlushableBuffer, Route};
/// use pusher_rs::sink::MemorySink;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let sink = Arc::new(MemorySink::new());
/// let config = PipelineConfig::default().with_flush_threshold(8);
/// let controller = BufferController::new(FlushableBuffer::new(sink.clone(), "s"), &config);
///
/// controller.add("aaaaa").await.unwrap();
/// let outcome = controller.add("bbbbb").await.unwrap();
/// assert_eq!(outcome.route, Route::Primary);
///
/// // Primary is now over the threshold: this one overflows and flushes.
/// let outcome = controller.add("ccccc").await.unwrap();
/// assert_eq!(outcome.route, Route::Overflow);
/// assert_eq!(sink.writes().len(), 1);
/// assert_eq!(controller.status().primary_count, 1);
/// # }
/// ```
pub struct BufferController {
    /// Buffer flushed to the sink.
    primary: FlushableBuffer,
    /// Buffer absorbing events while primary is full or flushing.
    overflow: Mutex<SerializedBuffer>,
    /// Primary size in bytes at which events overflow.
    threshold: usize,
    /// Ceiling on overflow size in bytes.
    overflow_limit: Option<usize>,
    /// Receiver of status snapshots.
    status_sink: Option<Arc<dyn StatusSink>>,
}

impl BufferController {
    /// Creates a controller around `primary` using the thresholds of `config`.
    pub fn new(primary: FlushableBuffer, config: &PipelineConfig) -> Self {
        Self {
            primary,
            overflow: Mutex::new(SerializedBuffer::new()),
            threshold: config.flush_threshold,
            overflow_limit: config.overflow_limit,
            status_sink: None,
        }
    }

    /// Publishes status snapshots to `sink`.
    #[must_use]
    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status_sink = Some(sink);
        self
    }

    /// Returns the primary buffer.
    pub const fn primary(&self) -> &FlushableBuffer {
        &self.primary
    }

    /// Returns the session identifier batches are written under.
    pub fn session_id(&self) -> &str {
        self.primary.session_id()
    }

    /// Buffers one event.
    ///
    /// If the event overflows and no flush is in flight, this call flushes
    /// primary and merges overflow once the flush settles, whatever its
    /// outcome. A failed flush is reported in [`AddOutcome::flush`], not as
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CodecError`] if the event cannot be serialized
    /// (the event is dropped), or [`BufferError::OverflowFull`] if it would
    /// push overflow past its ceiling (the event is not accepted). Buffer
    /// state is unchanged in both cases.
    pub async fn add<E: EventRecord + ?Sized>(&self, event: &E) -> Result<AddOutcome> {
        let route = match self.route(event) {
            Ok(route) => route,
            Err(err) => {
                warn!(error = %err, "event not buffered");
                return Err(err);
            }
        };

        let flush = if route == Route::Overflow && !self.primary.is_flushing() {
            let outcome = self.primary.flush().await;
            self.merge_pending();
            Some(outcome?)
        } else {
            None
        };

        self.publish_status();
        Ok(AddOutcome { route, flush })
    }

    /// Decides where `event` goes and buffers it there.
    fn route<E: EventRecord + ?Sized>(&self, event: &E) -> Result<Route> {
        let mut overflow = self.overflow.lock();

        if !self.primary.is_flushing() && !overflow.is_empty() {
            self.merge_locked(&mut overflow);
        }

        if self.primary.is_flushing() || self.primary.size() >= self.threshold {
            let record = event.to_record()?;
            check_record(&record)?;
            if let Some(limit) = self.overflow_limit {
                let grown = overflow.size() + record.len() + usize::from(!overflow.is_empty());
                if grown > limit {
                    return Err(BufferError::OverflowFull {
                        size: overflow.size(),
                        record: record.len(),
                        limit,
                    }
                    .into());
                }
            }
            overflow.add_event(record.as_str())?;
            debug!(overflow_size = overflow.size(), "event routed to overflow");
            Ok(Route::Overflow)
        } else {
            self.primary.add_event(event)?;
            Ok(Route::Primary)
        }
    }

    /// Folds overflow into primary and empties overflow.
    ///
    /// Idempotent: a no-op when overflow is empty. Publishes a status
    /// snapshot either way.
    pub fn merge_overflow(&self) {
        self.merge_pending();
        self.publish_status();
    }

    fn merge_pending(&self) {
        let mut overflow = self.overflow.lock();
        self.merge_locked(&mut overflow);
    }

    fn merge_locked(&self, overflow: &mut SerializedBuffer) {
        if overflow.count() == 0 {
            return;
        }
        debug!(
            events = overflow.count(),
            size = overflow.size(),
            "merging overflow into primary"
        );
        self.primary.add_raw_content(overflow.contents());
        overflow.empty();
    }

    /// Merges overflow and flushes primary regardless of its size.
    ///
    /// # Errors
    ///
    /// Returns an error only if the content cannot be encoded.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        self.merge_pending();
        let outcome = self.primary.flush().await;
        self.publish_status();
        outcome
    }

    /// Final forced flush for session teardown.
    ///
    /// Leaves both buffers empty when the sink accepts the batch.
    ///
    /// # Errors
    ///
    /// Returns an error only if the content cannot be encoded.
    pub async fn drain(&self) -> Result<FlushOutcome> {
        let outcome = self.flush().await?;
        let status = self.status();
        if status.is_drained() {
            info!(session_id = self.session_id(), "session drained");
        } else {
            warn!(
                session_id = self.session_id(),
                events = status.primary_count + status.overflow_count,
                "session not drained, events remain buffered"
            );
        }
        Ok(outcome)
    }

    /// Returns a snapshot of both buffers.
    pub fn status(&self) -> BufferStatus {
        let overflow = self.overflow.lock();
        BufferStatus {
            primary_size: self.primary.size(),
            primary_count: self.primary.count(),
            overflow_size: overflow.size(),
            overflow_count: overflow.count(),
            in_flight: self.primary.is_flushing(),
        }
    }

    fn publish_status(&self) {
        if let Some(sink) = &self.status_sink {
            sink.publish(&self.status());
        }
    }
}

impl std::fmt::Debug for BufferController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferController")
            .field("primary", &self.primary)
            .field("overflow", &*self.overflow.lock())
            .field("threshold", &self.threshold)
            .field("overflow_limit", &self.overflow_limit)
            .finish_non_exhaustive()
    }
}
