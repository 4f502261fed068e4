//! Serialized event buffer.
//!
//! A [`SerializedBuffer`] holds buffered events as one concatenated string of
//! records joined by [`EVENT_SEPARATOR`], together with the number of events.
//! Newer records are prepended, so the contents always read newest-first.

use crate::core::event::EventRecord;
use crate::error::CodecError;

/// Reserved separator between records (ASCII Record Separator).
///
/// JSON encoders always escape control characters, so a serialized JSON
/// record can never contain it.
pub const EVENT_SEPARATOR: char = '\u{1e}';

/// Ordered buffer of serialized event records.
///
/// Invariant: `count() == 1 + separators` when non-empty, `0` when empty.
///
/// # Examples
///
/// ```
/// use pusher_rs::core::SerializedBuffer;
///
/// let mut buffer = SerializedBuffer::new();
/// buffer.add_event("first").unwrap();
/// buffer.add_event("second").unwrap();
/// assert_eq!(buffer.count(), 2);
/// assert_eq!(buffer.contents(), "second\u{1e}first");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializedBuffer {
    /// Records joined by the separator, newest first.
    contents: String,
    /// Number of buffered events.
    event_count: usize,
}

impl SerializedBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            contents: String::new(),
            event_count: 0,
        }
    }

    /// Serializes `event` and prepends its record.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the event cannot be encoded,
    /// [`CodecError::EmptyRecord`] if it encodes to nothing, or
    /// [`CodecError::SeparatorInRecord`] if its record contains the
    /// separator. The buffer is unchanged in all cases.
    pub fn add_event<E: EventRecord + ?Sized>(&mut self, event: &E) -> Result<(), CodecError> {
        let record = event.to_record()?;
        check_record(&record)?;
        self.add_raw_content(&record);
        Ok(())
    }

    /// Prepends pre-serialized content, which may hold several records.
    ///
    /// The event count grows by the number of separators in `raw` plus one.
    /// Empty content is ignored.
    pub fn add_raw_content(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        self.event_count += count_records(raw);
        if self.contents.is_empty() {
            self.contents.push_str(raw);
        } else {
            let mut joined = String::with_capacity(raw.len() + 1 + self.contents.len());
            joined.push_str(raw);
            joined.push(EVENT_SEPARATOR);
            joined.push_str(&self.contents);
            self.contents = joined;
        }
    }

    /// Removes all content.
    pub fn empty(&mut self) {
        self.contents.clear();
        self.event_count = 0;
    }

    /// Returns the byte length of the concatenated contents.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.contents.len()
    }

    /// Returns the number of buffered events.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.event_count
    }

    /// Returns the concatenated contents, newest record first.
    #[must_use]
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Checks if the buffer is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Removes the oldest `size` bytes holding `count` events.
    ///
    /// Used after a successful flush: the flushed snapshot is always the
    /// tail of the contents, because anything added since was prepended.
    pub(crate) fn release_flushed(&mut self, size: usize, count: usize) {
        if size >= self.contents.len() {
            self.empty();
            return;
        }
        // Drop the snapshot and the separator in front of it.
        let keep = self.contents.len() - size - EVENT_SEPARATOR.len_utf8();
        self.contents.truncate(keep);
        self.event_count = self.event_count.saturating_sub(count);
    }
}

/// Counts the records in non-empty serialized content.
fn count_records(raw: &str) -> usize {
    raw.matches(EVENT_SEPARATOR).count() + 1
}

/// Rejects a single record that contains the separator.
pub(crate) fn check_record(record: &str) -> Result<(), CodecError> {
    if record.is_empty() {
        return Err(CodecError::EmptyRecord);
    }
    match record.find(EVENT_SEPARATOR) {
        Some(offset) => Err(CodecError::SeparatorInRecord { offset }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{ContentChange, EditEvent};
    use proptest::prelude::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let buffer = SerializedBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.size(), 0);
        assert_eq!(buffer.count(), 0);
    }

    #[test]
    fn test_newest_first_ordering() {
        let mut buffer = SerializedBuffer::new();
        buffer.add_event("e1").unwrap();
        buffer.add_event("e2").unwrap();
        buffer.add_event("e3").unwrap();
        assert!(buffer.contents().starts_with("e3"));
        assert_eq!(buffer.contents(), "e3\u{1e}e2\u{1e}e1");
    }

    #[test]
    fn test_add_edit_event() {
        let mut buffer = SerializedBuffer::new();
        let event = EditEvent::new("1", vec![ContentChange::insert(0, "~tilde~")]);
        buffer.add_event(&event).unwrap();
        assert_eq!(buffer.count(), 1);
        assert_eq!(buffer.contents(), event.to_record().unwrap());
    }

    #[test]
    fn test_control_character_in_text_is_escaped() {
        // The separator inside event text is escaped by JSON, not rejected.
        let mut buffer = SerializedBuffer::new();
        let event = EditEvent::new("1", vec![ContentChange::insert(0, "a\u{1e}b")]);
        buffer.add_event(&event).unwrap();
        assert_eq!(buffer.count(), 1);
        assert!(!buffer.contents().contains(EVENT_SEPARATOR));
    }

    #[test]
    fn test_record_with_separator_rejected() {
        let mut buffer = SerializedBuffer::new();
        buffer.add_event("ok").unwrap();
        let err = buffer.add_event("bad\u{1e}record").unwrap_err();
        assert_eq!(err, CodecError::SeparatorInRecord { offset: 3 });
        assert_eq!(buffer.count(), 1);
        assert_eq!(buffer.contents(), "ok");
    }

    #[test]
    fn test_empty_record_rejected() {
        let mut buffer = SerializedBuffer::new();
        buffer.add_event("a").unwrap();
        assert_eq!(buffer.add_event("").unwrap_err(), CodecError::EmptyRecord);
        buffer.add_event("b").unwrap();
        assert_eq!(buffer.count(), 2);
        assert_eq!(buffer.contents(), "b\u{1e}a");
    }

    #[test]
    fn test_add_raw_content_counts_records() {
        let mut buffer = SerializedBuffer::new();
        buffer.add_event("a").unwrap();
        buffer.add_raw_content("d\u{1e}c\u{1e}b");
        assert_eq!(buffer.count(), 4);
        assert_eq!(buffer.contents(), "d\u{1e}c\u{1e}b\u{1e}a");
    }

    #[test]
    fn test_add_raw_content_empty_is_noop() {
        let mut buffer = SerializedBuffer::new();
        buffer.add_raw_content("");
        assert_eq!(buffer.count(), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_resets() {
        let mut buffer = SerializedBuffer::new();
        buffer.add_event("abc").unwrap();
        buffer.empty();
        assert_eq!(buffer, SerializedBuffer::new());
    }

    #[test]
    fn test_size_is_byte_length() {
        let mut buffer = SerializedBuffer::new();
        buffer.add_event("世界").unwrap();
        assert_eq!(buffer.size(), 6);
        buffer.add_event("ab").unwrap();
        assert_eq!(buffer.size(), 9);
    }

    #[test]
    fn test_release_flushed_keeps_newer_records() {
        let mut buffer = SerializedBuffer::new();
        buffer.add_event("old1").unwrap();
        buffer.add_event("old2").unwrap();
        let (size, count) = (buffer.size(), buffer.count());
        buffer.add_event("new").unwrap();

        buffer.release_flushed(size, count);
        assert_eq!(buffer.contents(), "new");
        assert_eq!(buffer.count(), 1);
    }

    #[test]
    fn test_release_flushed_whole_buffer() {
        let mut buffer = SerializedBuffer::new();
        buffer.add_event("only").unwrap();
        buffer.release_flushed(buffer.size(), buffer.count());
        assert!(buffer.is_empty());
        assert_eq!(buffer.count(), 0);
    }

    proptest! {
        #[test]
        fn count_matches_events_added(records in proptest::collection::vec("[^\u{1e}]{1,40}", 1..50)) {
            let mut buffer = SerializedBuffer::new();
            for record in &records {
                buffer.add_event(record.as_str()).unwrap();
            }
            prop_assert_eq!(buffer.count(), records.len());
            prop_assert_eq!(
                buffer.contents().matches(EVENT_SEPARATOR).count(),
                records.len() - 1
            );
            prop_assert!(buffer.contents().starts_with(records[records.len() - 1].as_str()));
        }
    }
}
