//! Edit events and their record serialization.
//!
//! An edit event is a timestamp plus the content changes an editor reported
//! for one keystroke or paste. The buffering pipeline never looks inside an
//! event: it only asks for its serialized record through [`EventRecord`].

use crate::error::CodecError;
use serde::{Deserialize, Serialize};

/// Capability of anything that can be buffered as one event record.
///
/// Implementations must return a stable serialization: the same event
/// always produces the same record.
pub trait EventRecord {
    /// Serializes the event to its record form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the event cannot be encoded.
    fn to_record(&self) -> Result<String, CodecError>;
}

/// Pre-serialized records are buffered verbatim.
impl EventRecord for str {
    fn to_record(&self) -> Result<String, CodecError> {
        Ok(self.to_owned())
    }
}

impl EventRecord for String {
    fn to_record(&self) -> Result<String, CodecError> {
        Ok(self.clone())
    }
}

/// A zero-based line/character position in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based line number.
    pub line: u32,
    /// Zero-based character offset within the line.
    pub character: u32,
}

/// A range between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextRange {
    /// Start position (inclusive).
    pub start: Position,
    /// End position (exclusive).
    pub end: Position,
}

/// A single content change inside a document.
///
/// Mirrors the shape editors report: the replaced range, its offset and
/// length, and the inserted text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChange {
    /// Range that was replaced.
    #[serde(default)]
    pub range: TextRange,
    /// Offset of the replaced range.
    #[serde(default)]
    pub range_offset: usize,
    /// Length of the replaced range.
    #[serde(default)]
    pub range_length: usize,
    /// Text that replaced the range.
    pub text: String,
}

impl ContentChange {
    /// Creates an insertion of `text` at `offset` with no replaced range.
    #[must_use]
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self {
            range_offset: offset,
            text: text.into(),
            ..Self::default()
        }
    }
}

/// An edit event captured from a document.
///
/// # Examples
///
/// ```
/// use pusher_rs::core::{ContentChange, EditEvent, EventRecord};
///
/// let event = EditEvent::new("1700000000000", vec![ContentChange::insert(0, "a")]);
/// let record = event.to_record().unwrap();
/// assert!(record.starts_with(r#"{"eventId":"1700000000000""#));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditEvent {
    /// Capture time; informative, not required to be increasing.
    pub timestamp: String,
    /// Content changes carried by this event.
    #[serde(default, alias = "contentChanges")]
    pub changes: Vec<ContentChange>,
}

impl EditEvent {
    /// Creates an event from a timestamp and its changes.
    #[must_use]
    pub fn new(timestamp: impl Into<String>, changes: Vec<ContentChange>) -> Self {
        Self {
            timestamp: timestamp.into(),
            changes,
        }
    }

    /// Creates an event stamped with the current time in milliseconds.
    #[must_use]
    pub fn now(changes: Vec<ContentChange>) -> Self {
        Self::new(current_millis().to_string(), changes)
    }
}

impl EventRecord for EditEvent {
    fn to_record(&self) -> Result<String, CodecError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Record<'a> {
            event_id: &'a str,
            content: &'a [ContentChange],
        }

        Ok(serde_json::to_string(&Record {
            event_id: &self.timestamp,
            content: &self.changes,
        })?)
    }
}

/// One record decoded from a stored batch.
///
/// Records produced by [`EditEvent`] parse as `eventId` plus `content`;
/// anything else is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    /// Identifier (capture timestamp) of the event.
    pub event_id: String,
    /// Raw content of the event.
    pub content: serde_json::Value,
}

/// Returns the current Unix timestamp in milliseconds.
#[allow(clippy::cast_possible_truncation)]
fn current_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_event_record_shape() {
        let event = EditEvent::new("42", vec![ContentChange::insert(3, "x")]);
        let record = event.to_record().unwrap();
        let value: serde_json::Value = serde_json::from_str(&record).unwrap();
        assert_eq!(value["eventId"], "42");
        assert_eq!(value["content"][0]["text"], "x");
        assert_eq!(value["content"][0]["rangeOffset"], 3);
    }

    #[test]
    fn test_record_is_stable() {
        let event = EditEvent::new("1", vec![ContentChange::insert(0, "hello")]);
        assert_eq!(event.to_record().unwrap(), event.to_record().unwrap());
    }

    #[test]
    fn test_record_parses_as_stored_record() {
        let event = EditEvent::new("7", vec![ContentChange::insert(0, "é\"\n")]);
        let stored: StoredRecord = serde_json::from_str(&event.to_record().unwrap()).unwrap();
        assert_eq!(stored.event_id, "7");
        assert_eq!(stored.content[0]["text"], "é\"\n");
    }

    #[test]
    fn test_edit_event_accepts_editor_field_name() {
        let json = r#"{"timestamp":"5","contentChanges":[{"text":"a","rangeOffset":1,"rangeLength":0}]}"#;
        let event: EditEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.changes.len(), 1);
        assert_eq!(event.changes[0].range_offset, 1);
    }

    #[test]
    fn test_str_record_is_verbatim() {
        assert_eq!("abcd".to_record().unwrap(), "abcd");
        assert_eq!(String::from("xy").to_record().unwrap(), "xy");
    }

    #[test]
    fn test_now_stamps_timestamp() {
        let event = EditEvent::now(Vec::new());
        assert!(event.timestamp.parse::<u64>().unwrap() > 0);
    }
}
