//! Encoding and decoding of DNS messages in their RFC 1035 wire format.
//!
//! - [`buffer`] - Cursor-based byte buffer with bounds-checked reads and the
//!   compression-aware domain name reader
//! - [`dns`] - Header, question, resource record and packet types with their
//!   `parse`/`write` codecs
//! - [`resolver`] - A single UDP query/response exchange built on the codec

pub mod buffer;
pub mod dns;
pub mod resolver;
