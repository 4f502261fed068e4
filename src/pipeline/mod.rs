//! Buffered flush pipeline.
//!
//! Events are buffered in a [`FlushableBuffer`], routed by a
//! [`BufferController`] and pushed to a sink by the [`driver`] loop.

pub mod controller;
pub mod driver;
pub mod flushable;
pub mod status;

pub use controller::{AddOutcome, BufferController, Route};
pub use driver::{RunSummary, run};
pub use flushable::{FlushOutcome, FlushReport, FlushableBuffer};
pub use status::{BufferStatus, StatusSink, TracingStatusSink};
