//! CLI layer for pusher.
//!
//! Provides the command-line interface using clap, with commands for
//! initializing the event store, pushing edit events through the buffered
//! pipeline and inspecting stored sessions.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
