//! One-shot DNS queries over UDP.
//!
//! This module is the thin transport layer around the codec in [`crate::dns`]:
//! it builds a query, sends it to an upstream server in a single UDP datagram,
//! receives one response of at most 512 bytes and hands it to the parser.
//!
//! Queries are not retried and no read timeout is configured. Responses are
//! not cached, and truncated answers are returned as they are.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dns_wire::dns::QueryType;
//! use dns_wire::resolver::resolve;
//!
//! let response = resolve("example.com", QueryType::A, "8.8.8.8:53".parse().unwrap())?;
//! for answer in &response.answers {
//!     if let Some(ip) = answer.get_ipv4_address() {
//!         println!("{} has address {}", answer.domain(), ip);
//!     }
//! }
//! # Ok::<(), dns_wire::resolver::DnsError>(())
//! ```

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use thiserror::Error;
use tracing::{debug, warn};

use crate::buffer::{MAX_PACKET_SIZE, PacketError};
use crate::dns::{DnsPacket, QueryType, ResultCode};

/// Errors that can occur while resolving a name.
#[derive(Error, Debug)]
pub enum DnsError {
    /// Socket setup, sending or receiving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The query could not be encoded or the response could not be decoded.
    #[error("Invalid DNS message: {0}")]
    Packet(#[from] PacketError),

    /// The response carries a different transaction id than the query.
    #[error("Response id {received} does not match query id {expected}")]
    IdMismatch { expected: u16, received: u16 },

    /// The server answered, but with a result code other than NOERROR.
    #[error("DNS server returned an error: {0}")]
    ServerReturnedError(ResultCode),
}

/// Sends a single recursive query for `domain_name` to `server` and returns the
/// parsed response.
///
/// The query carries a random transaction id and has the Recursion Desired
/// flag set. The socket is bound to an ephemeral port of the same address
/// family as `server` and connected to it, so datagrams from other peers are
/// ignored by the operating system.
///
/// # Errors
///
/// - [`DnsError::Io`] if the socket cannot be bound or the exchange fails.
/// - [`DnsError::Packet`] if the name cannot be encoded or the response is
///   malformed.
/// - [`DnsError::IdMismatch`] if the response answers a different query.
/// - [`DnsError::ServerReturnedError`] for NXDOMAIN, SERVFAIL and the like.
pub fn resolve(
    domain_name: &str,
    query_type: QueryType,
    server: SocketAddr,
) -> Result<DnsPacket, DnsError> {
    let query = DnsPacket::query(fastrand::u16(..), domain_name, query_type);
    let response = exchange(&query, server)?;

    let rescode = response.header.rescode;
    if rescode != ResultCode::NoError {
        warn!(%server, domain = domain_name, %rescode, "server returned an error");
        return Err(DnsError::ServerReturnedError(rescode));
    }

    Ok(response)
}

/// Sends `query` to `server` and parses whatever single datagram comes back.
///
/// Unlike [`resolve`] this does not look at the result code, which makes it
/// suitable for callers that want to inspect NXDOMAIN responses themselves.
/// The transaction id is still checked.
///
/// # Errors
///
/// - [`DnsError::Io`] if the socket cannot be bound or the exchange fails.
/// - [`DnsError::Packet`] if `query` cannot be encoded or the response is
///   malformed.
/// - [`DnsError::IdMismatch`] if the response carries another transaction id.
pub fn exchange(query: &DnsPacket, server: SocketAddr) -> Result<DnsPacket, DnsError> {
    let local: SocketAddr = match server {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local)?;
    socket.connect(server)?;

    let request = query.to_bytes()?;
    socket.send(&request)?;
    debug!(%server, id = query.header.id, bytes = request.len(), "sent query");

    let mut response_buffer = [0u8; MAX_PACKET_SIZE];
    let size = socket.recv(&mut response_buffer)?;
    debug!(%server, bytes = size, "received response");

    let response = DnsPacket::from_bytes(&response_buffer[..size])?;
    if response.header.id != query.header.id {
        return Err(DnsError::IdMismatch {
            expected: query.header.id,
            received: response.header.id,
        });
    }

    Ok(response)
}
