//! Incremental decoding of the repository corpus
//!
//! The corpus is a single JSON array that may be far larger than memory, so
//! elements are parsed one at a time straight off the reader.

pub mod decoder;
pub mod variant;

pub use decoder::StreamDecoder;
pub use variant::record_from_value;
