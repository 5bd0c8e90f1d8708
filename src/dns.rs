//! DNS message model and its wire codec.
//!
//! This module turns the raw bytes held by a [`BytePacketBuffer`] into structured
//! DNS messages and back again. Every type exposes a `parse` function that consumes
//! exactly the bytes it represents and a `write` function that appends them.
//!
//! The implementation follows RFC 1035 section 4 (Messages). Only the `A` record
//! type is interpreted; every other record type is carried as an opaque
//! [`DnsRecord::Unknown`] so the rest of the message still parses.
//!
//! # Core Types
//!
//! - [`DnsHeader`] - The fixed 12-byte header with its bit-packed flags
//! - [`DnsQuestion`] - One entry of the question section
//! - [`DnsRecord`] - One resource record of the answer, authority or additional section
//! - [`DnsPacket`] - A complete message
//!
//! # Examples
//!
//! Building a query and reading it back:
//!
//! ```rust
//! use dns_wire::dns::{DnsPacket, QueryType};
//!
//! let query = DnsPacket::query(1337, "example.com", QueryType::A);
//! let bytes = query.to_bytes().unwrap();
//!
//! let parsed = DnsPacket::from_bytes(&bytes).unwrap();
//! assert_eq!(parsed.header.id, 1337);
//! assert!(parsed.header.recursion_desired);
//! assert_eq!(parsed.questions[0].name, "example.com");
//! ```
//!
//! # Section Counts
//!
//! The four counts in [`DnsHeader`] are the only thing that tells the parser how
//! many entries follow. [`DnsPacket::write`] emits the header as given and does not
//! recompute them, so callers that build packets by hand must keep the counts in
//! line with the section vectors.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use tracing::trace;

use crate::buffer::{BytePacketBuffer, PacketError, Result};

/// Size of the fixed DNS header in bytes.
pub const HEADER_SIZE: usize = 12;

/// The only record class this codec speaks (IN, the Internet).
const CLASS_IN: u16 = 1;

/// The type of a DNS question or resource record.
///
/// Only `A` has meaning to this crate. Any other type code is preserved as
/// [`QueryType::Unknown`] so it can be written back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// IPv4 host address (type 1).
    A,
    /// Any other type code.
    Unknown(u16),
}

impl QueryType {
    /// The 16-bit type code used on the wire.
    pub fn to_num(self) -> u16 {
        match self {
            QueryType::A => 1,
            QueryType::Unknown(num) => num,
        }
    }

    /// Maps a wire type code to a `QueryType`. Codes other than 1 become
    /// [`QueryType::Unknown`], so no information is lost.
    pub fn from_num(num: u16) -> QueryType {
        match num {
            1 => QueryType::A,
            _ => QueryType::Unknown(num),
        }
    }
}

impl From<u16> for QueryType {
    fn from(num: u16) -> Self {
        QueryType::from_num(num)
    }
}

impl From<QueryType> for u16 {
    fn from(qtype: QueryType) -> Self {
        qtype.to_num()
    }
}

/// Parses `A`, the generic `TYPE<n>` notation of RFC 3597, or a bare number.
impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        if upper == "A" {
            return Ok(QueryType::A);
        }

        upper
            .strip_prefix("TYPE")
            .unwrap_or(&upper)
            .parse::<u16>()
            .map(QueryType::from_num)
            .map_err(|_| format!("Unknown query type: {}", s))
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::A => write!(f, "A"),
            QueryType::Unknown(num) => write!(f, "TYPE{}", num),
        }
    }
}

/// DNS result codes carried in the low 4 bits of the header flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultCode {
    /// No error condition.
    #[default]
    NoError = 0,
    /// The server could not interpret the query.
    FormErr = 1,
    /// The server failed to process the query.
    ServFail = 2,
    /// The queried name does not exist.
    NxDomain = 3,
    /// The server does not support the requested kind of query.
    NotImp = 4,
    /// The server refuses to answer for policy reasons.
    Refused = 5,
}

impl TryFrom<u8> for ResultCode {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ResultCode::NoError),
            1 => Ok(ResultCode::FormErr),
            2 => Ok(ResultCode::ServFail),
            3 => Ok(ResultCode::NxDomain),
            4 => Ok(ResultCode::NotImp),
            5 => Ok(ResultCode::Refused),
            _ => Err(PacketError::UnsupportedResultCode(value)),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultCode::NoError => "NOERROR",
            ResultCode::FormErr => "FORMERR",
            ResultCode::ServFail => "SERVFAIL",
            ResultCode::NxDomain => "NXDOMAIN",
            ResultCode::NotImp => "NOTIMP",
            ResultCode::Refused => "REFUSED",
        };
        f.write_str(name)
    }
}

/// The 12-byte header found at the start of every DNS message.
///
/// The two flag bytes are unpacked into individual fields. On the wire they
/// are laid out as follows (most significant bit first):
///
/// ```text
/// byte 2:  QR | OPCODE (4) | AA | TC | RD
/// byte 3:  RA | Z | AD | CD | RCODE (4)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DnsHeader {
    /// Transaction id, echoed by the server in its response.
    pub id: u16,

    pub recursion_desired: bool,
    pub truncated_message: bool,
    pub authoritative_answer: bool,
    /// Kind of query, 0 for a standard query. Must fit in 4 bits.
    pub opcode: u8,
    /// Set in responses, clear in queries.
    pub response: bool,

    pub rescode: ResultCode,
    pub checking_disabled: bool,
    pub authed_data: bool,
    pub z: bool,
    pub recursion_available: bool,

    /// Number of entries in the question section.
    pub questions: u16,
    /// Number of records in the answer section.
    pub answers: u16,
    /// Number of records in the authority section.
    pub authoritative_entries: u16,
    /// Number of records in the additional section.
    pub resource_entries: u16,
}

impl DnsHeader {
    /// A header with every flag clear, id 0 and all counts 0.
    pub fn new() -> Self {
        DnsHeader::default()
    }

    /// Reads a header at the cursor.
    ///
    /// # Errors
    ///
    /// - [`PacketError::PacketTooShort`] if fewer than 12 bytes remain.
    /// - [`PacketError::UnsupportedResultCode`] if the result code is above 5.
    pub fn parse(buffer: &mut BytePacketBuffer) -> Result<Self> {
        if buffer.remaining() < HEADER_SIZE {
            return Err(PacketError::PacketTooShort {
                length: buffer.remaining(),
            });
        }

        let id = buffer.read_u16()?;

        let flags = buffer.read_u16()?;
        let a = (flags >> 8) as u8;
        let b = (flags & 0xFF) as u8;

        let header = DnsHeader {
            id,

            recursion_desired: (a & (1 << 0)) > 0,
            truncated_message: (a & (1 << 1)) > 0,
            authoritative_answer: (a & (1 << 2)) > 0,
            opcode: (a >> 3) & 0x0F,
            response: (a & (1 << 7)) > 0,

            rescode: ResultCode::try_from(b & 0x0F)?,
            checking_disabled: (b & (1 << 4)) > 0,
            authed_data: (b & (1 << 5)) > 0,
            z: (b & (1 << 6)) > 0,
            recursion_available: (b & (1 << 7)) > 0,

            questions: buffer.read_u16()?,
            answers: buffer.read_u16()?,
            authoritative_entries: buffer.read_u16()?,
            resource_entries: buffer.read_u16()?,
        };

        Ok(header)
    }

    /// Appends the header to `buffer`.
    ///
    /// # Errors
    ///
    /// [`PacketError::InvalidOpcode`] if `opcode` does not fit in 4 bits. The
    /// buffer is left untouched in that case.
    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<()> {
        if self.opcode > 0x0F {
            return Err(PacketError::InvalidOpcode(self.opcode));
        }

        buffer.write_u16(self.id);

        buffer.write_u8(
            (self.recursion_desired as u8)
                | ((self.truncated_message as u8) << 1)
                | ((self.authoritative_answer as u8) << 2)
                | (self.opcode << 3)
                | ((self.response as u8) << 7),
        );

        buffer.write_u8(
            (self.rescode as u8)
                | ((self.checking_disabled as u8) << 4)
                | ((self.authed_data as u8) << 5)
                | ((self.z as u8) << 6)
                | ((self.recursion_available as u8) << 7),
        );

        buffer.write_u16(self.questions);
        buffer.write_u16(self.answers);
        buffer.write_u16(self.authoritative_entries);
        buffer.write_u16(self.resource_entries);

        Ok(())
    }
}

impl fmt::Display for DnsHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            ";; opcode: {}, status: {}, id: {}",
            self.opcode, self.rescode, self.id
        )?;

        write!(f, ";; flags:")?;
        let flags = [
            (self.response, "qr"),
            (self.authoritative_answer, "aa"),
            (self.truncated_message, "tc"),
            (self.recursion_desired, "rd"),
            (self.recursion_available, "ra"),
            (self.z, "z"),
            (self.authed_data, "ad"),
            (self.checking_disabled, "cd"),
        ];
        for (_, name) in flags.iter().filter(|(set, _)| *set) {
            write!(f, " {}", name)?;
        }

        write!(
            f,
            "; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
            self.questions, self.answers, self.authoritative_entries, self.resource_entries
        )
    }
}

/// An entry of the question section: what is being asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: QueryType,
}

impl DnsQuestion {
    /// Creates a question for `name` of the given type.
    pub fn new(name: impl Into<String>, qtype: QueryType) -> Self {
        DnsQuestion {
            name: name.into(),
            qtype,
        }
    }

    /// Reads a question at the cursor. The class is read and discarded.
    ///
    /// # Errors
    ///
    /// Any [`PacketError`] from reading the name, or
    /// [`PacketError::OutOfRange`] if the type or class field is cut off.
    pub fn parse(buffer: &mut BytePacketBuffer) -> Result<Self> {
        let name = buffer.read_qname()?;
        let qtype = QueryType::from_num(buffer.read_u16()?);
        let _class = buffer.read_u16()?;

        Ok(DnsQuestion { name, qtype })
    }

    /// Appends the question with class IN.
    ///
    /// # Errors
    ///
    /// [`PacketError::LabelTooLong`] or [`PacketError::EmptyLabel`] if the name
    /// cannot be encoded.
    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<()> {
        buffer.write_qname(&self.name)?;
        buffer.write_u16(self.qtype.to_num());
        buffer.write_u16(CLASS_IN);

        Ok(())
    }
}

impl fmt::Display for DnsQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.\tIN\t{}", self.name, self.qtype)
    }
}

/// A resource record from the answer, authority or additional section.
///
/// Every record shares the same prefix on the wire: name, 16-bit type, 16-bit
/// class, 32-bit TTL and a 16-bit rdata length. The variant decides how the
/// rdata that follows is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsRecord {
    /// An IPv4 address record.
    A {
        domain: String,
        addr: Ipv4Addr,
        ttl: u32,
    },
    /// A record of a type this crate does not interpret.
    ///
    /// The rdata is kept as raw bytes so the record can be written back and so
    /// records that follow it in the same section stay aligned. `data_len`
    /// is the length declared on the wire and matches `data.len()` for parsed
    /// records.
    Unknown {
        domain: String,
        qtype: u16,
        data_len: u16,
        ttl: u32,
        data: Vec<u8>,
    },
}

impl DnsRecord {
    /// Reads a resource record at the cursor.
    ///
    /// On success the cursor ends up after the declared rdata, whatever the
    /// record type. An `A` record reads its 4 address bytes and skips any excess
    /// the length field declares.
    ///
    /// # Errors
    ///
    /// - [`PacketError::OutOfRange`] if the declared rdata runs past the end of
    ///   the message.
    /// - [`PacketError::RdataTooShort`] for an `A` record declaring fewer than
    ///   4 bytes of rdata.
    /// - Any other [`PacketError`] raised while reading the owner name.
    pub fn parse(buffer: &mut BytePacketBuffer) -> Result<Self> {
        let domain = buffer.read_qname()?;

        let qtype_num = buffer.read_u16()?;
        let _class = buffer.read_u16()?;
        let ttl = buffer.read_u32()?;
        let data_len = buffer.read_u16()?;

        let record = match QueryType::from_num(qtype_num) {
            QueryType::A => {
                if data_len < 4 {
                    return Err(PacketError::RdataTooShort {
                        qtype: qtype_num,
                        length: data_len,
                        expected: 4,
                    });
                }
                let addr = Ipv4Addr::from(buffer.read_u32()?);
                buffer.skip(usize::from(data_len) - 4)?;
                DnsRecord::A { domain, addr, ttl }
            }
            QueryType::Unknown(qtype) => {
                let data = buffer.read_bytes(usize::from(data_len))?;
                DnsRecord::Unknown {
                    domain,
                    qtype,
                    data_len,
                    ttl,
                    data,
                }
            }
        };

        Ok(record)
    }

    /// Appends the record with class IN.
    ///
    /// # Errors
    ///
    /// - [`PacketError::LabelTooLong`] or [`PacketError::EmptyLabel`] for an
    ///   owner name that cannot be encoded.
    /// - [`PacketError::RdataLengthMismatch`] if an `Unknown` record's
    ///   `data_len` differs from the length of its `data`.
    ///
    /// Nothing is written when an error is returned.
    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<()> {
        match self {
            DnsRecord::A { domain, addr, ttl } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::A.to_num());
                buffer.write_u16(CLASS_IN);
                buffer.write_u32(*ttl);
                buffer.write_u16(4);
                buffer.write_bytes(&addr.octets());
            }
            DnsRecord::Unknown {
                domain,
                qtype,
                data_len,
                ttl,
                data,
            } => {
                if usize::from(*data_len) != data.len() {
                    return Err(PacketError::RdataLengthMismatch {
                        declared: *data_len,
                        actual: data.len(),
                    });
                }
                buffer.write_qname(domain)?;
                buffer.write_u16(*qtype);
                buffer.write_u16(CLASS_IN);
                buffer.write_u32(*ttl);
                buffer.write_u16(*data_len);
                buffer.write_bytes(data);
            }
        }

        Ok(())
    }

    /// The owner name of the record.
    pub fn domain(&self) -> &str {
        match self {
            DnsRecord::A { domain, .. } | DnsRecord::Unknown { domain, .. } => domain,
        }
    }

    /// Time to live in seconds.
    pub fn ttl(&self) -> u32 {
        match self {
            DnsRecord::A { ttl, .. } | DnsRecord::Unknown { ttl, .. } => *ttl,
        }
    }

    /// The record type, as carried in the type field on the wire.
    pub fn qtype(&self) -> QueryType {
        match self {
            DnsRecord::A { .. } => QueryType::A,
            DnsRecord::Unknown { qtype, .. } => QueryType::from_num(*qtype),
        }
    }

    /// Returns the address of an `A` record, or `None` for any other record.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dns_wire::dns::DnsRecord;
    /// use std::net::Ipv4Addr;
    ///
    /// let record = DnsRecord::A {
    ///     domain: "example.com".to_string(),
    ///     addr: Ipv4Addr::new(93, 184, 216, 34),
    ///     ttl: 3600,
    /// };
    /// assert_eq!(record.get_ipv4_address(), Some(Ipv4Addr::new(93, 184, 216, 34)));
    /// ```
    pub fn get_ipv4_address(&self) -> Option<Ipv4Addr> {
        match self {
            DnsRecord::A { addr, .. } => Some(*addr),
            _ => None,
        }
    }

    /// Returns the type code and rdata of an uninterpreted record.
    pub fn get_raw_data(&self) -> Option<(u16, &[u8])> {
        match self {
            DnsRecord::Unknown { qtype, data, .. } => Some((*qtype, data)),
            _ => None,
        }
    }
}

/// Presentation format; uninterpreted rdata uses the `\# <len> <hex>` notation
/// from RFC 3597.
impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<30} {:<10} IN {:<8} ",
            format!("{}.", self.domain()),
            self.ttl(),
            self.qtype().to_string()
        )?;

        match self {
            DnsRecord::A { addr, .. } => write!(f, "{}", addr),
            DnsRecord::Unknown { data_len, data, .. } => {
                write!(f, "\\# {}", data_len)?;
                if !data.is_empty() {
                    f.write_str(" ")?;
                    for byte in data {
                        write!(f, "{:02x}", byte)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// A complete DNS message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DnsPacket {
    pub header: DnsHeader,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
    pub authorities: Vec<DnsRecord>,
    pub additionals: Vec<DnsRecord>,
}

impl DnsPacket {
    /// An empty packet with a zeroed header.
    pub fn new() -> Self {
        DnsPacket::default()
    }

    /// Builds a standard recursive query with a single question.
    ///
    /// The header has `recursion_desired` set and a question count of one, so
    /// the packet is consistent and ready to be written.
    pub fn query(id: u16, name: &str, qtype: QueryType) -> Self {
        let mut packet = DnsPacket::new();
        packet.header.id = id;
        packet.header.recursion_desired = true;
        packet.header.questions = 1;
        packet.questions.push(DnsQuestion::new(name, qtype));
        packet
    }

    /// Reads a whole message: header, then each section in wire order, with
    /// the number of entries taken from the header counts.
    ///
    /// # Errors
    ///
    /// The first [`PacketError`] hit by any section. Nothing is returned for a
    /// partially parsed message.
    pub fn parse(buffer: &mut BytePacketBuffer) -> Result<Self> {
        let header = DnsHeader::parse(buffer)?;
        trace!(offset = buffer.pos(), id = header.id, "parsed header");

        let mut questions = Vec::with_capacity(usize::from(header.questions));
        for _ in 0..header.questions {
            questions.push(DnsQuestion::parse(buffer)?);
        }
        trace!(offset = buffer.pos(), count = questions.len(), "parsed questions");

        let answers = parse_section(buffer, header.answers, "answer")?;
        let authorities = parse_section(buffer, header.authoritative_entries, "authority")?;
        let additionals = parse_section(buffer, header.resource_entries, "additional")?;

        Ok(DnsPacket {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// Appends the whole message to `buffer`.
    ///
    /// The header counts are written as they are. See the module documentation
    /// on keeping them consistent.
    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<()> {
        self.header.write(buffer)?;

        for question in &self.questions {
            question.write(buffer)?;
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
        {
            record.write(buffer)?;
        }

        Ok(())
    }

    /// Parses a message from a received datagram.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buffer = BytePacketBuffer::from_bytes(bytes);
        DnsPacket::parse(&mut buffer)
    }

    /// Serializes the message into a fresh byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = BytePacketBuffer::new();
        self.write(&mut buffer)?;
        Ok(buffer.into_bytes())
    }
}

fn parse_section(
    buffer: &mut BytePacketBuffer,
    count: u16,
    section: &'static str,
) -> Result<Vec<DnsRecord>> {
    let mut records = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        records.push(DnsRecord::parse(buffer)?);
    }
    trace!(offset = buffer.pos(), count, section, "parsed section");
    Ok(records)
}

impl fmt::Display for DnsPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;

        writeln!(f)?;
        writeln!(f, ";; QUESTION SECTION:")?;
        for question in &self.questions {
            writeln!(f, ";{}", question)?;
        }

        let sections = [
            ("ANSWER", &self.answers),
            ("AUTHORITY", &self.authorities),
            ("ADDITIONAL", &self.additionals),
        ];
        for (title, records) in sections {
            if records.is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, ";; {} SECTION:", title)?;
            for record in records {
                writeln!(f, "{}", record)?;
            }
        }

        Ok(())
    }
}
