//! Transport encoding for flushed batches.
//!
//! A batch leaves the pipeline as one opaque string: the buffered contents
//! are JSON-escaped, LZ4-compressed and base64 encoded (URL-safe, no
//! padding), so the payload survives any text-based transport. Decoding
//! reverses every step exactly.

mod transport;

pub use transport::{chronological, decode_batch, decode_records, encode_batch, split_records};
