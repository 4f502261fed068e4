//! Core domain models for pusher.
//!
//! This module contains the edit event types and the serialized event
//! buffer. These are pure data structures with no I/O dependencies.

pub mod buffer;
pub mod event;

pub use buffer::{EVENT_SEPARATOR, SerializedBuffer};
pub use event::{ContentChange, EditEvent, EventRecord, Position, StoredRecord, TextRange};
