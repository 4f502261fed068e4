//! Batch payload encoding and order recovery.

use crate::core::EVENT_SEPARATOR;
use crate::error::CodecError;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

/// Encodes buffered contents into a transport payload.
///
/// # Examples
///
/// ```
/// use pusher_rs::codec::{decode_batch, encode_batch};
///
/// let payload = encode_batch("newest\u{1e}oldest").unwrap();
/// assert_eq!(decode_batch(&payload).unwrap(), "newest\u{1e}oldest");
/// ```
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if escaping fails.
pub fn encode_batch(contents: &str) -> Result<String, CodecError> {
    let escaped = escape(contents)?;
    let compressed = lz4_flex::compress_prepend_size(escaped.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Decodes a transport payload back into buffered contents.
///
/// # Errors
///
/// Returns a [`CodecError`] if any decoding step fails.
pub fn decode_batch(payload: &str) -> Result<String, CodecError> {
    let compressed = URL_SAFE_NO_PAD.decode(payload.trim())?;
    let escaped = String::from_utf8(lz4_flex::decompress_size_prepended(&compressed)?)?;
    unescape(&escaped)
}

/// Splits buffered contents into records, newest first.
pub fn split_records(contents: &str) -> impl DoubleEndedIterator<Item = &str> {
    contents
        .split(EVENT_SEPARATOR)
        .filter(|record| !record.is_empty())
}

/// Returns the records of buffered contents in capture order, oldest first.
#[must_use]
pub fn chronological(contents: &str) -> Vec<&str> {
    split_records(contents).rev().collect()
}

/// Decodes a payload and returns its records oldest first.
///
/// # Errors
///
/// Returns a [`CodecError`] if the payload cannot be decoded.
pub fn decode_records(payload: &str) -> Result<Vec<String>, CodecError> {
    let contents = decode_batch(payload)?;
    Ok(chronological(&contents)
        .into_iter()
        .map(ToString::to_string)
        .collect())
}

/// JSON-escapes `s` without the surrounding quotes.
fn escape(s: &str) -> Result<String, CodecError> {
    let quoted = serde_json::to_string(s)?;
    Ok(quoted[1..quoted.len() - 1].to_string())
}

/// Reverses [`escape`].
fn unescape(s: &str) -> Result<String, CodecError> {
    serde_json::from_str(&format!("\"{s}\"")).map_err(|e| CodecError::Unescape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("" ; "empty")]
    #[test_case("plain ascii" ; "ascii")]
    #[test_case("quotes \" and \\ backslashes" ; "escapes")]
    #[test_case("line\nbreak\ttab\r" ; "whitespace controls")]
    #[test_case("\u{1d}\u{1e}\u{1f}~" ; "separator adjacent")]
    #[test_case("日本語 ✓ 🎉 é" ; "unicode")]
    fn test_round_trip(input: &str) {
        let payload = encode_batch(input).unwrap();
        assert_eq!(decode_batch(&payload).unwrap(), input);
    }

    #[test]
    fn test_payload_is_url_safe() {
        let payload = encode_batch(&"{\"eventId\":\"1\"}\u{1e}".repeat(50)).unwrap();
        assert!(
            payload
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_repetitive_batches_compress() {
        let contents = "{\"eventId\":\"1\",\"content\":[]}\u{1e}".repeat(200);
        let payload = encode_batch(&contents).unwrap();
        assert!(payload.len() < contents.len() / 4);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_batch("not base64!"),
            Err(CodecError::Base64(_))
        ));
        let not_lz4 = URL_SAFE_NO_PAD.encode([10, 0, 0, 0, 0xff, 0xff]);
        assert!(matches!(
            decode_batch(&not_lz4),
            Err(CodecError::Decompress(_))
        ));
    }

    #[test]
    fn test_split_and_chronological() {
        let contents = "e3\u{1e}e2\u{1e}e1";
        assert_eq!(split_records(contents).collect::<Vec<_>>(), ["e3", "e2", "e1"]);
        assert_eq!(chronological(contents), ["e1", "e2", "e3"]);
        assert!(chronological("").is_empty());
    }

    #[test]
    fn test_decode_records() {
        let payload = encode_batch("b\u{1e}a").unwrap();
        assert_eq!(decode_records(&payload).unwrap(), ["a", "b"]);
    }

    proptest! {
        #[test]
        fn round_trip_arbitrary_unicode(input in "\\PC*") {
            let payload = encode_batch(&input).unwrap();
            prop_assert_eq!(decode_batch(&payload).unwrap(), input);
        }
    }
}
