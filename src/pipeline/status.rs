//! Buffer occupancy status.
//!
//! A [`BufferStatus`] is a read-only snapshot of both buffers, published to
//! an optional [`StatusSink`] after every routing decision and flush.

use std::fmt;

use serde::Serialize;
use tracing::debug;

/// Snapshot of primary and overflow occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BufferStatus {
    /// Primary buffer size in bytes.
    pub primary_size: usize,
    /// Events in the primary buffer.
    pub primary_count: usize,
    /// Overflow buffer size in bytes.
    pub overflow_size: usize,
    /// Events in the overflow buffer.
    pub overflow_count: usize,
    /// Whether a flush is in flight.
    pub in_flight: bool,
}

impl BufferStatus {
    /// Returns `true` when neither buffer holds events.
    #[must_use]
    pub const fn is_drained(&self) -> bool {
        self.primary_count == 0 && self.overflow_count == 0
    }
}

/// Renders the status line, e.g. `Pusher: 120/3, 40/1`.
///
/// The overflow part is only shown while overflow holds content.
impl fmt::Display for BufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pusher: {}/{}", self.primary_size, self.primary_count)?;
        if self.overflow_size > 0 {
            write!(f, ", {}/{}", self.overflow_size, self.overflow_count)?;
        }
        Ok(())
    }
}

/// Receiver of status snapshots (status bar, dashboard, log).
pub trait StatusSink: Send + Sync {
    /// Publishes a snapshot. Must not block.
    fn publish(&self, status: &BufferStatus);
}

/// [`StatusSink`] that emits snapshots as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn publish(&self, status: &BufferStatus) {
        debug!(
            primary_size = status.primary_size,
            primary_count = status.primary_count,
            overflow_size = status.overflow_size,
            overflow_count = status.overflow_count,
            in_flight = status.in_flight,
            "{status}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_without_overflow() {
        let status = BufferStatus {
            primary_size: 120,
            primary_count: 3,
            ..BufferStatus::default()
        };
        assert_eq!(status.to_string(), "Pusher: 120/3");
    }

    #[test]
    fn test_status_line_with_overflow() {
        let status = BufferStatus {
            primary_size: 120,
            primary_count: 3,
            overflow_size: 40,
            overflow_count: 1,
            in_flight: true,
        };
        assert_eq!(status.to_string(), "Pusher: 120/3, 40/1");
        assert!(!status.is_drained());
    }

    #[test]
    fn test_default_is_drained() {
        assert!(BufferStatus::default().is_drained());
    }
}
