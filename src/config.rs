//! Pipeline configuration.
//!
//! Settings resolve in order: compiled-in defaults, then a JSON config file,
//! then command-line flags.
//!
//! Config file resolution:
//! 1. Explicit path (`--config` flag or `PUSHER_CONFIG`)
//! 2. `<config dir>/pusher/config.json` when it exists
//!
//! An explicit path must exist; the default location is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Default primary flush threshold in bytes.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 10_000;

/// Default overflow ceiling in bytes (1 MiB).
pub const DEFAULT_OVERFLOW_LIMIT: usize = 1024 * 1024;

/// Default periodic flush interval in seconds.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

/// Default book identifier for new documents.
pub const DEFAULT_BOOK_ID: &str = "default";

/// Config file location under the user config directory.
const CONFIG_FILE: &str = "pusher/config.json";

/// Buffering and flushing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Primary size in bytes at which new events overflow and a flush starts.
    pub flush_threshold: usize,
    /// Ceiling on overflow size in bytes; `None` is unbounded.
    pub overflow_limit: Option<usize>,
    /// Seconds between forced flushes; `None` disables them.
    pub flush_interval_secs: Option<u64>,
    /// Book new documents are registered under.
    pub book_id: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            overflow_limit: Some(DEFAULT_OVERFLOW_LIMIT),
            flush_interval_secs: Some(DEFAULT_FLUSH_INTERVAL_SECS),
            book_id: DEFAULT_BOOK_ID.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Reads a config file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| Error::Config {
            message: format!("invalid config {}: {e}", path.display()),
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Resolves the config file and loads it, or returns defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an explicit path is missing or any
    /// resolved file is invalid.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Returns the default config file path.
    ///
    /// Returns `None` if the config directory cannot be determined.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Checks the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero threshold, a zero interval or a
    /// zero overflow limit.
    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(config_error("flush_threshold must be greater than 0"));
        }
        if self.flush_interval_secs == Some(0) {
            return Err(config_error(
                "flush_interval_secs must be greater than 0 (use null to disable)",
            ));
        }
        if self.overflow_limit == Some(0) {
            return Err(config_error(
                "overflow_limit must hold at least one record (use null for unbounded)",
            ));
        }
        Ok(())
    }

    /// Returns the periodic flush interval.
    #[must_use]
    pub fn flush_interval(&self) -> Option<Duration> {
        self.flush_interval_secs.map(Duration::from_secs)
    }

    /// Sets the flush threshold.
    #[must_use]
    pub const fn with_flush_threshold(mut self, bytes: usize) -> Self {
        self.flush_threshold = bytes;
        self
    }

    /// Sets the overflow ceiling.
    #[must_use]
    pub const fn with_overflow_limit(mut self, bytes: Option<usize>) -> Self {
        self.overflow_limit = bytes;
        self
    }

    /// Sets the periodic flush interval.
    #[must_use]
    pub const fn with_flush_interval(mut self, secs: Option<u64>) -> Self {
        self.flush_interval_secs = secs;
        self
    }

    /// Sets the book identifier.
    #[must_use]
    pub fn with_book_id(mut self, book_id: impl Into<String>) -> Self {
        self.book_id = book_id.into();
        self
    }
}

fn config_error(message: &str) -> Error {
    Error::Config {
        message: message.to_string(),
    }
}
