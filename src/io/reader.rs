//! Event source reading.
//!
//! Events arrive as JSON lines, one [`EditEvent`] per line. A source is a
//! file path or `-` for standard input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::core::EditEvent;
use crate::error::{CodecError, IoError, Result};

/// Path that selects standard input.
pub const STDIN_SOURCE: &str = "-";

/// Iterator over the events in a JSON-lines source.
///
/// Blank lines are skipped. A malformed line yields
/// [`CodecError::MalformedEvent`] with its one-based line number and the
/// iterator continues with the next line.
///
/// # Examples
///
/// ```
/// use pusher_rs::io::EventReader;
///
/// let input = "{\"timestamp\":\"1\",\"changes\":[]}\n\n{\"timestamp\":\"2\"}\n";
/// let events: Vec<_> = EventReader::new(input.as_bytes())
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(events.len(), 2);
/// assert_eq!(events[1].timestamp, "2");
/// ```
pub struct EventReader<R: BufRead> {
    /// Underlying line source.
    inner: R,
    /// Source name for error messages.
    source: String,
    /// Lines consumed so far.
    line: usize,
    /// Reused line buffer.
    buf: String,
}

impl<R: BufRead> EventReader<R> {
    /// Wraps a buffered reader.
    pub fn new(inner: R) -> Self {
        Self::named(inner, "<input>")
    }

    /// Wraps a buffered reader, naming it in error messages.
    pub fn named(inner: R, source: impl Into<String>) -> Self {
        Self {
            inner,
            source: source.into(),
            line: 0,
            buf: String::new(),
        }
    }

    /// Returns the number of lines consumed.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<EditEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line += 1,
                Err(e) => {
                    return Some(Err(IoError::ReadFailed {
                        path: self.source.clone(),
                        reason: e.to_string(),
                    }
                    .into()));
                }
            }

            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }

            return Some(serde_json::from_str(text).map_err(|e| {
                CodecError::MalformedEvent {
                    line: self.line,
                    reason: e.to_string(),
                }
                .into()
            }));
        }
    }
}

/// Opens an event source. `-` selects standard input.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] if the path does not exist, or
/// [`IoError::ReadFailed`] if it cannot be opened.
pub fn open_source<P: AsRef<Path>>(path: P) -> Result<EventReader<Box<dyn BufRead + Send>>> {
    let path_ref = path.as_ref();
    if path_ref.as_os_str() == STDIN_SOURCE {
        let stdin: Box<dyn BufRead + Send> = Box::new(BufReader::new(std::io::stdin()));
        return Ok(EventReader::named(stdin, "<stdin>"));
    }

    let path_str = path_ref.to_string_lossy().to_string();
    if !path_ref.exists() {
        return Err(IoError::FileNotFound { path: path_str }.into());
    }

    let file = File::open(path_ref).map_err(|e| IoError::ReadFailed {
        path: path_str.clone(),
        reason: e.to_string(),
    })?;
    let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(file));
    Ok(EventReader::named(reader, path_str))
}
