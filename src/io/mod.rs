//! Event source I/O.
//!
//! Reads JSON-lines edit events from files or standard input.

pub mod reader;

pub use reader::{EventReader, STDIN_SOURCE, open_source};
