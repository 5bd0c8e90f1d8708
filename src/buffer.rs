//! Cursor-based byte buffer for the DNS wire format.
//!
//! [`BytePacketBuffer`] holds the raw bytes of a single DNS message together with a
//! cursor. It serves two roles:
//!
//! - **Read mode**: created from a received datagram with
//!   [`BytePacketBuffer::from_bytes`]. Every `read_*` call is bounds-checked against
//!   both the buffer length and the classic 512-byte UDP message ceiling, and advances
//!   the cursor by the width it consumed.
//! - **Write mode**: created empty with [`BytePacketBuffer::new`]. Every `write_*`
//!   call appends to the end of the buffer and moves the cursor to the new end.
//!
//! On top of the fixed-width accessors the buffer knows exactly one piece of DNS
//! structure: domain names (qnames). [`BytePacketBuffer::read_qname`] follows
//! compression pointers (RFC 1035 section 4.1.4) with a hard limit on the number of
//! jumps, and [`BytePacketBuffer::write_qname`] emits names uncompressed.
//!
//! # Examples
//!
//! ```rust
//! use dns_wire::buffer::BytePacketBuffer;
//!
//! let mut buffer = BytePacketBuffer::new();
//! buffer.write_qname("www.example.com").unwrap();
//! buffer.write_u16(1);
//!
//! buffer.seek(0);
//! assert_eq!(buffer.read_qname().unwrap(), "www.example.com");
//! assert_eq!(buffer.read_u16().unwrap(), 1);
//! ```

use thiserror::Error;

/// Largest DNS message carried over classic UDP (RFC 1035 section 4.2.1).
pub const MAX_PACKET_SIZE: usize = 512;

/// Largest length of a single label within a domain name.
pub const MAX_LABEL_LENGTH: usize = 63;

/// Number of compression pointer hops at which name decoding gives up.
pub const MAX_JUMPS: usize = 5;

/// Errors produced while encoding or decoding a DNS message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// A read would run past the end of the buffer or the 512-byte ceiling.
    #[error("read of {length} byte(s) at offset {position} is out of range")]
    OutOfRange { position: usize, length: usize },

    /// A compression pointer chain needed too many hops to resolve.
    #[error("limit of {limit} compression pointer jumps exceeded")]
    TooManyJumps { limit: usize },

    /// A label handed to the writer is longer than 63 bytes.
    #[error("label '{label}' is {length} bytes long, the maximum is 63")]
    LabelTooLong { label: String, length: usize },

    /// A name handed to the writer contains two consecutive dots.
    #[error("domain name contains an empty label")]
    EmptyLabel,

    /// A length byte uses one of the reserved `01`/`10` label type prefixes.
    #[error("reserved label type in length byte {0:#04x}")]
    InvalidLabelType(u8),

    /// Fewer than 12 bytes were left when the header was parsed.
    #[error("packet is {length} bytes long, a header needs 12")]
    PacketTooShort { length: usize },

    /// The header carries a result code outside NOERROR..=REFUSED.
    #[error("unsupported result code {0}")]
    UnsupportedResultCode(u8),

    /// The header opcode does not fit into its 4-bit field.
    #[error("opcode {0} does not fit into 4 bits")]
    InvalidOpcode(u8),

    /// A record declares less rdata than its type needs.
    #[error("type {qtype} record declares {length} byte(s) of rdata, needs {expected}")]
    RdataTooShort {
        qtype: u16,
        length: u16,
        expected: u16,
    },

    /// A record's declared rdata length disagrees with the payload it carries.
    #[error("record declares {declared} byte(s) of rdata but carries {actual}")]
    RdataLengthMismatch { declared: u16, actual: usize },
}

pub type Result<T> = std::result::Result<T, PacketError>;

/// A DNS message buffer with a single read/write cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BytePacketBuffer {
    buf: Vec<u8>,
    pos: usize,
}

impl BytePacketBuffer {
    /// Creates an empty buffer ready for writing.
    pub fn new() -> Self {
        BytePacketBuffer {
            buf: Vec::with_capacity(MAX_PACKET_SIZE),
            pos: 0,
        }
    }

    /// Creates a buffer over a received message, with the cursor at offset 0.
    ///
    /// The bytes are copied so the buffer does not borrow from the receive
    /// buffer. Input longer than [`MAX_PACKET_SIZE`] is accepted, but nothing
    /// past the ceiling can ever be read.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        BytePacketBuffer {
            buf: bytes.to_vec(),
            pos: 0,
        }
    }

    /// Current cursor offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Total number of bytes held, including any past the 512-byte ceiling.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written or received.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of readable bytes between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.limit().saturating_sub(self.pos)
    }

    /// The whole buffer, independent of the cursor position.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the buffer and returns its bytes, typically a message that is
    /// ready to be sent.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Moves the cursor to an absolute offset.
    ///
    /// The offset is not validated here. A cursor past the end of the buffer
    /// makes the next read fail with [`PacketError::OutOfRange`].
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Advances the cursor past `length` bytes without copying them.
    ///
    /// # Errors
    ///
    /// [`PacketError::OutOfRange`] if fewer than `length` readable bytes remain.
    /// The cursor does not move in that case.
    pub fn skip(&mut self, length: usize) -> Result<()> {
        self.get_range(self.pos, length)?;
        self.pos += length;
        Ok(())
    }

    /// Returns the byte at `pos` without touching the cursor.
    pub fn get(&self, pos: usize) -> Result<u8> {
        Ok(self.get_range(pos, 1)?[0])
    }

    /// Returns `length` bytes starting at `start` without touching the cursor.
    ///
    /// # Errors
    ///
    /// [`PacketError::OutOfRange`] if `start + length` exceeds the buffer length
    /// or [`MAX_PACKET_SIZE`].
    pub fn get_range(&self, start: usize, length: usize) -> Result<&[u8]> {
        let out_of_range = PacketError::OutOfRange {
            position: start,
            length,
        };
        match start.checked_add(length) {
            Some(end) if end <= self.limit() => Ok(&self.buf[start..end]),
            _ => Err(out_of_range),
        }
    }

    /// Returns the byte at the cursor without advancing it.
    pub fn peek_u8(&self) -> Result<u8> {
        self.get(self.pos)
    }

    /// Returns the big-endian `u16` at the cursor without advancing it.
    pub fn peek_u16(&self) -> Result<u16> {
        self.peek_array().map(u16::from_be_bytes)
    }

    /// Reads one byte and advances the cursor by one.
    ///
    /// # Errors
    ///
    /// [`PacketError::OutOfRange`] at the end of the buffer. Failed reads never
    /// move the cursor; the same holds for the wider reads below.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_array().map(u8::from_be_bytes)
    }

    /// Reads a big-endian `u16` and advances the cursor by two.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    /// Reads a big-endian `u32` and advances the cursor by four.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Reads `length` bytes at the cursor and advances past them.
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        let bytes = self.get_range(self.pos, length)?.to_vec();
        self.pos += length;
        Ok(bytes)
    }

    /// Appends one byte.
    pub fn write_u8(&mut self, val: u8) {
        self.write_bytes(&[val]);
    }

    /// Appends a `u16` in network byte order.
    pub fn write_u16(&mut self, val: u16) {
        self.write_bytes(&val.to_be_bytes());
    }

    /// Appends a `u32` in network byte order.
    pub fn write_u32(&mut self, val: u32) {
        self.write_bytes(&val.to_be_bytes());
    }

    /// Appends raw bytes and moves the cursor to the new end of the buffer.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.pos = self.buf.len();
    }

    /// Reads a domain name at the cursor, following compression pointers.
    ///
    /// Labels are joined with `.`; the root name decodes to the empty string.
    /// Case is preserved as it appears on the wire and label bytes that are not
    /// valid UTF-8 are replaced with U+FFFD rather than rejected.
    ///
    /// After the call the cursor sits right after the name as it appears at the
    /// starting position: after the terminating zero byte when the name is
    /// uncompressed, or after the first 2-byte pointer otherwise. Pointers
    /// reached while already following a pointer only move the internal read
    /// position. On error the cursor is left where it was.
    ///
    /// # Errors
    ///
    /// - [`PacketError::TooManyJumps`] once [`MAX_JUMPS`] pointers have been
    ///   followed, which also stops pointer cycles.
    /// - [`PacketError::OutOfRange`] if a length byte, pointer or label runs past
    ///   the end of the buffer.
    /// - [`PacketError::InvalidLabelType`] for the reserved `01`/`10` prefixes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dns_wire::buffer::BytePacketBuffer;
    ///
    /// // "example" at offset 0, then a pointer back to it at offset 9.
    /// let bytes = [7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0, 0xc0, 0x00];
    /// let mut buffer = BytePacketBuffer::from_bytes(&bytes);
    /// buffer.seek(9);
    ///
    /// assert_eq!(buffer.read_qname().unwrap(), "example");
    /// assert_eq!(buffer.pos(), 11);
    /// ```
    pub fn read_qname(&mut self) -> Result<String> {
        let mut pos = self.pos;
        let mut resume_at = None;
        let mut jumps = 0;
        let mut name = String::new();

        loop {
            if jumps >= MAX_JUMPS {
                return Err(PacketError::TooManyJumps { limit: MAX_JUMPS });
            }

            let len = self.get(pos)?;

            match len & 0xC0 {
                0xC0 => {
                    let low = self.get(pos + 1)?;
                    resume_at.get_or_insert(pos + 2);

                    pos = (usize::from(len & 0x3F) << 8) | usize::from(low);
                    jumps += 1;
                }
                0x00 => {
                    pos += 1;

                    if len == 0 {
                        self.seek(resume_at.unwrap_or(pos));
                        return Ok(name);
                    }

                    let label = self.get_range(pos, usize::from(len))?;
                    if !name.is_empty() {
                        name.push('.');
                    }
                    name.push_str(&String::from_utf8_lossy(label));
                    pos += usize::from(len);
                }
                _ => return Err(PacketError::InvalidLabelType(len)),
            }
        }
    }

    /// Writes a domain name as uncompressed length-prefixed labels.
    ///
    /// An empty name (or `"."`) is written as the root, a single zero byte. One
    /// trailing dot is ignored, so `"example.com."` and `"example.com"` encode
    /// identically. Nothing is written if the name is rejected.
    ///
    /// # Errors
    ///
    /// - [`PacketError::LabelTooLong`] if any label exceeds 63 bytes.
    /// - [`PacketError::EmptyLabel`] if the name contains `..` or starts with a dot.
    pub fn write_qname(&mut self, qname: &str) -> Result<()> {
        let qname = qname.strip_suffix('.').unwrap_or(qname);

        let mut encoded = Vec::with_capacity(qname.len() + 2);
        if !qname.is_empty() {
            for label in qname.split('.') {
                let length = label.len();
                if length == 0 {
                    return Err(PacketError::EmptyLabel);
                }
                if length > MAX_LABEL_LENGTH {
                    return Err(PacketError::LabelTooLong {
                        label: label.to_string(),
                        length,
                    });
                }

                encoded.push(length as u8);
                encoded.extend_from_slice(label.as_bytes());
            }
        }
        encoded.push(0);

        self.write_bytes(&encoded);
        Ok(())
    }

    fn limit(&self) -> usize {
        self.buf.len().min(MAX_PACKET_SIZE)
    }

    fn peek_array<const N: usize>(&self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.get_range(self.pos, N)?);
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let out = self.peek_array()?;
        self.pos += N;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_at_offset_12() -> Vec<u8> {
        let mut data = vec![0u8; 12];
        data.extend_from_slice(&[7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0]);
        data
    }

    #[test]
    fn test_fixed_width_reads_are_big_endian() {
        let mut buffer = BytePacketBuffer::from_bytes(&[0x12, 0x34, 0xde, 0xad, 0xbe, 0xef, 0x7f]);
        assert_eq!(buffer.peek_u16().unwrap(), 0x1234);
        assert_eq!(buffer.pos(), 0);
        assert_eq!(buffer.read_u16().unwrap(), 0x1234);
        assert_eq!(buffer.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(buffer.peek_u8().unwrap(), 0x7f);
        assert_eq!(buffer.read_u8().unwrap(), 0x7f);
        assert_eq!(buffer.pos(), 7);
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn test_read_u16_with_one_byte_left_is_out_of_range() {
        let mut buffer = BytePacketBuffer::from_bytes(&[0x00, 0x01, 0x02]);
        buffer.seek(2);
        assert_eq!(
            buffer.read_u16(),
            Err(PacketError::OutOfRange {
                position: 2,
                length: 2
            })
        );
        // A failed read leaves the cursor alone.
        assert_eq!(buffer.pos(), 2);
    }

    #[test]
    fn test_reads_stop_at_packet_ceiling() {
        let data = vec![0u8; MAX_PACKET_SIZE + 8];
        let mut buffer = BytePacketBuffer::from_bytes(&data);
        buffer.seek(MAX_PACKET_SIZE - 1);
        assert!(buffer.read_u8().is_ok());
        assert!(matches!(
            buffer.read_u8(),
            Err(PacketError::OutOfRange { .. })
        ));
        assert!(buffer.get_range(MAX_PACKET_SIZE - 4, 4).is_ok());
        assert!(buffer.get_range(MAX_PACKET_SIZE - 4, 5).is_err());
    }

    #[test]
    fn test_get_range_overflow_is_out_of_range() {
        let buffer = BytePacketBuffer::from_bytes(&[1, 2, 3]);
        assert!(matches!(
            buffer.get_range(usize::MAX, 2),
            Err(PacketError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_seek_past_end_fails_on_next_read() {
        let mut buffer = BytePacketBuffer::from_bytes(&[1, 2]);
        buffer.seek(10);
        assert_eq!(buffer.pos(), 10);
        assert!(buffer.read_u8().is_err());
    }

    #[test]
    fn test_writes_append_and_move_cursor() {
        let mut buffer = BytePacketBuffer::new();
        buffer.write_u8(0xab);
        buffer.write_u16(0x0102);
        buffer.write_u32(0x0304_0506);
        buffer.write_bytes(&[7, 8]);
        assert_eq!(buffer.pos(), 9);
        assert_eq!(buffer.as_bytes(), &[0xab, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_write_qname() {
        let mut buffer = BytePacketBuffer::new();
        buffer.write_qname("www.google.com").unwrap();
        assert_eq!(
            buffer.into_bytes(),
            vec![
                3, b'w', b'w', b'w', 6, b'g', b'o', b'o', b'g', b'l', b'e', 3, b'c', b'o', b'm', 0
            ]
        );
    }

    #[test]
    fn test_write_root_and_trailing_dot() {
        let mut buffer = BytePacketBuffer::new();
        buffer.write_qname("").unwrap();
        buffer.write_qname(".").unwrap();
        assert_eq!(buffer.as_bytes(), &[0, 0]);

        let mut dotted = BytePacketBuffer::new();
        dotted.write_qname("example.com.").unwrap();
        let mut plain = BytePacketBuffer::new();
        plain.write_qname("example.com").unwrap();
        assert_eq!(dotted, plain);
    }

    #[test]
    fn test_write_qname_rejects_long_label() {
        let label = "a".repeat(64);
        let mut buffer = BytePacketBuffer::new();
        let err = buffer.write_qname(&format!("{label}.com")).unwrap_err();
        assert_eq!(
            err,
            PacketError::LabelTooLong {
                label,
                length: 64
            }
        );
        assert!(buffer.is_empty());

        // 63 is still fine.
        buffer.write_qname(&"b".repeat(63)).unwrap();
        assert_eq!(buffer.len(), 65);
    }

    #[test]
    fn test_write_qname_rejects_empty_label() {
        let mut buffer = BytePacketBuffer::new();
        assert_eq!(buffer.write_qname("a..b"), Err(PacketError::EmptyLabel));
        assert_eq!(buffer.write_qname(".a"), Err(PacketError::EmptyLabel));
    }

    #[test]
    fn test_qname_round_trip_preserves_case() {
        for name in ["example.com", "WwW.ExAmPlE.org", "a.b.c.d.e.f", "x"] {
            let mut buffer = BytePacketBuffer::new();
            buffer.write_u16(0xffff);
            buffer.write_qname(name).unwrap();
            let end = buffer.pos();

            buffer.seek(2);
            assert_eq!(buffer.read_qname().unwrap(), name);
            assert_eq!(buffer.pos(), end);
        }
    }

    #[test]
    fn test_read_root_name() {
        let mut buffer = BytePacketBuffer::from_bytes(&[0, 0xaa]);
        assert_eq!(buffer.read_qname().unwrap(), "");
        assert_eq!(buffer.pos(), 1);
    }

    #[test]
    fn test_read_pointer_to_offset_12() {
        let mut data = example_at_offset_12();
        data.extend_from_slice(&[0xde, 0xad, 0xc0, 0x0c, 0xff]);
        let mut buffer = BytePacketBuffer::from_bytes(&data);
        buffer.seek(23);

        assert_eq!(buffer.read_qname().unwrap(), "example");
        assert_eq!(buffer.pos(), 25);
    }

    #[test]
    fn test_read_label_followed_by_pointer() {
        // f.example.com where "example.com" is reached through a pointer.
        let data = vec![
            0x01, b'f', 0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm',
            0x00, 0xaa, 0x01, b'f', 0xc0, 0x02,
        ];
        let mut buffer = BytePacketBuffer::from_bytes(&data);
        buffer.seek(16);

        assert_eq!(buffer.read_qname().unwrap(), "f.example.com");
        assert_eq!(buffer.pos(), 20);
    }

    #[test]
    fn test_cursor_skips_only_first_pointer() {
        // offset 12: "example" 0; offset 21: "www" + pointer to 12;
        // offset 27: pointer to 21.
        let mut data = example_at_offset_12();
        data.extend_from_slice(&[3, b'w', b'w', b'w', 0xc0, 12, 0xc0, 21, 0xee]);
        let mut buffer = BytePacketBuffer::from_bytes(&data);
        buffer.seek(27);

        assert_eq!(buffer.read_qname().unwrap(), "www.example");
        assert_eq!(buffer.pos(), 29);
        assert_eq!(buffer.read_u8().unwrap(), 0xee);
    }

    #[test]
    fn test_skip_is_bounds_checked() {
        let mut buffer = BytePacketBuffer::from_bytes(&[1, 2, 3, 4]);
        buffer.skip(3).unwrap();
        assert_eq!(buffer.pos(), 3);
        assert_eq!(
            buffer.skip(2),
            Err(PacketError::OutOfRange {
                position: 3,
                length: 2
            })
        );
        assert_eq!(buffer.pos(), 3);
        buffer.skip(1).unwrap();
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn test_failed_qname_leaves_cursor_alone() {
        // A valid pointer at offset 2 leading into a self-pointer cycle.
        let mut buffer = BytePacketBuffer::from_bytes(&[0xc0, 0x00, 0xc0, 0x00]);
        buffer.seek(2);
        assert!(buffer.read_qname().is_err());
        assert_eq!(buffer.pos(), 2);

        // A pointer whose target label is truncated.
        let mut buffer = BytePacketBuffer::from_bytes(&[9, b'a', 0xc0, 0x00]);
        buffer.seek(2);
        assert!(matches!(
            buffer.read_qname(),
            Err(PacketError::OutOfRange { .. })
        ));
        assert_eq!(buffer.pos(), 2);
    }

    #[test]
    fn test_self_pointer_fails_with_too_many_jumps() {
        let mut data = vec![0u8; 12];
        data.extend_from_slice(&[0xc0, 0x0c]);
        let mut buffer = BytePacketBuffer::from_bytes(&data);
        buffer.seek(12);

        assert_eq!(
            buffer.read_qname(),
            Err(PacketError::TooManyJumps { limit: MAX_JUMPS })
        );
    }

    #[test]
    fn test_two_pointer_cycle_fails() {
        let data = vec![0xc0, 0x02, 0xc0, 0x00];
        let mut buffer = BytePacketBuffer::from_bytes(&data);
        assert!(matches!(
            buffer.read_qname(),
            Err(PacketError::TooManyJumps { .. })
        ));
    }

    /// Builds `hops` pointers, each pointing at the next, ending at label "a".
    fn pointer_chain(hops: usize) -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..hops {
            let target = (2 * (i + 1)) as u8;
            data.extend_from_slice(&[0xc0, target]);
        }
        data.extend_from_slice(&[1, b'a', 0]);
        data
    }

    #[test]
    fn test_four_jumps_are_allowed() {
        let mut buffer = BytePacketBuffer::from_bytes(&pointer_chain(MAX_JUMPS - 1));
        assert_eq!(buffer.read_qname().unwrap(), "a");
        assert_eq!(buffer.pos(), 2);
    }

    #[test]
    fn test_five_jumps_are_rejected() {
        let mut buffer = BytePacketBuffer::from_bytes(&pointer_chain(MAX_JUMPS));
        assert_eq!(
            buffer.read_qname(),
            Err(PacketError::TooManyJumps { limit: MAX_JUMPS })
        );
    }

    #[test]
    fn test_label_past_end_is_out_of_range() {
        let mut buffer = BytePacketBuffer::from_bytes(&[5, b'a', b'b']);
        assert!(matches!(
            buffer.read_qname(),
            Err(PacketError::OutOfRange {
                position: 1,
                length: 5
            })
        ));
    }

    #[test]
    fn test_truncated_pointer_is_out_of_range() {
        let mut buffer = BytePacketBuffer::from_bytes(&[0xc0]);
        assert!(matches!(
            buffer.read_qname(),
            Err(PacketError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_missing_terminator_is_out_of_range() {
        let mut buffer = BytePacketBuffer::from_bytes(&[3, b'c', b'o', b'm']);
        assert!(buffer.read_qname().is_err());
    }

    #[test]
    fn test_reserved_label_type() {
        let mut buffer = BytePacketBuffer::from_bytes(&[0x40, b'a']);
        assert_eq!(buffer.read_qname(), Err(PacketError::InvalidLabelType(0x40)));
    }

    #[test]
    fn test_invalid_utf8_label_is_replaced() {
        let mut buffer = BytePacketBuffer::from_bytes(&[2, 0xff, b'a', 0]);
        assert_eq!(buffer.read_qname().unwrap(), "\u{fffd}a");
        assert_eq!(buffer.pos(), 4);
    }
}
