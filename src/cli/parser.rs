//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pusher: buffered capture of document edit events.
///
/// Buffers edit events, flushes them in compressed batches and keeps
/// every stored batch in a local append-only event store.
#[derive(Parser, Debug)]
#[command(name = "pusher")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the event store database file.
    ///
    /// Defaults to `.pusher/pusher-events.db` in the current directory.
    #[arg(short, long, env = "PUSHER_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Path to a JSON pipeline config file.
    #[arg(short, long, env = "PUSHER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the event store.
    ///
    /// Creates the database file and schema if they don't exist.
    Init {
        /// Force re-initialization (destroys existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Show event store status.
    Status,

    /// Buffer and flush a stream of edit events.
    ///
    /// Reads JSON-lines edit events and pushes them through the buffered
    /// pipeline into a new session of the event store.
    Push {
        /// JSON-lines event file, or `-` for stdin.
        #[arg(default_value = "-")]
        events: PathBuf,

        /// Document the events belong to (defaults to the events path).
        #[arg(short = 'D', long)]
        document: Option<String>,

        /// Book the document is registered under.
        #[arg(short, long)]
        book: Option<String>,

        /// Primary flush threshold in bytes.
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Overflow ceiling in bytes (0 for unbounded).
        #[arg(long)]
        overflow_limit: Option<usize>,

        /// Seconds between forced flushes (0 disables).
        #[arg(long)]
        flush_interval: Option<u64>,

        /// Buffer and encode without writing to the event store.
        #[arg(long)]
        dry_run: bool,
    },

    /// List capture sessions.
    #[command(alias = "ls")]
    Sessions {
        /// Only sessions for this document.
        #[arg(short = 'D', long)]
        document: Option<String>,
    },

    /// List the batches stored for a session.
    Batches {
        /// Session ID.
        session: String,
    },

    /// Decode stored batches and print their records oldest first.
    Replay {
        /// Session ID.
        session: String,

        /// Only this batch.
        #[arg(long)]
        batch: Option<String>,
    },

    /// Reset the event store (delete all data).
    Reset {
        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_db_path() {
        let cli = Cli {
            db_path: None,
            config: None,
            verbose: false,
            format: "text".to_string(),
            command: Commands::Status,
        };
        assert_eq!(
            cli.get_db_path(),
            PathBuf::from(crate::storage::DEFAULT_DB_PATH)
        );
    }

    #[test]
    fn test_custom_db_path() {
        let cli = Cli::parse_from(["pusher", "--db-path", "/custom/path.db", "status"]);
        assert_eq!(cli.get_db_path(), PathBuf::from("/custom/path.db"));
    }

    #[test]
    fn test_push_defaults_to_stdin() {
        let cli = Cli::parse_from(["pusher", "push"]);
        let Commands::Push {
            events, dry_run, ..
        } = cli.command
        else {
            unreachable!("expected push");
        };
        assert_eq!(events, PathBuf::from("-"));
        assert!(!dry_run);
    }

    #[test]
    fn test_push_overrides() {
        let cli = Cli::parse_from([
            "pusher",
            "push",
            "events.jsonl",
            "--threshold",
            "64",
            "--flush-interval",
            "0",
            "--dry-run",
        ]);
        let Commands::Push {
            threshold,
            flush_interval,
            dry_run,
            ..
        } = cli.command
        else {
            unreachable!("expected push");
        };
        assert_eq!(threshold, Some(64));
        assert_eq!(flush_interval, Some(0));
        assert!(dry_run);
    }

    #[test]
    fn test_replay_batch_flag() {
        let cli = Cli::parse_from(["pusher", "replay", "s1", "--batch", "b1"]);
        assert!(matches!(
            cli.command,
            Commands::Replay { ref session, batch: Some(ref b) } if session == "s1" && b == "b1"
        ));
    }
}
