// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entry model: the opaque record handed to the writer.
//!
//! The writer never inspects the semantic fields of an entry. It needs
//! exactly three capabilities, captured by the [`Entry`] trait: the size of
//! the fixed binary header, the ability to encode that header into a caller
//! buffer, and access to the immutable payload bytes.
//!
//! [`LogEntry`] is the stock implementation used by the ingest pipeline: a
//! timestamped, tagged payload with a source address, encoding to the
//! 34-byte header the indexer expects.

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};
use crate::protocol::MAX_ENTRY_SIZE;

/// Capability set the writer requires from an entry.
///
/// Implementations must encode a header of exactly `HEADER_SIZE` bytes that
/// carries the payload length; the indexer sizes its payload read from it.
/// The header layout is otherwise opaque to the writer.
pub trait Entry: Send + Sync {
    /// Size in bytes of the fixed binary header.
    const HEADER_SIZE: usize;

    /// Encode the fixed-size header into `dst`.
    ///
    /// `dst` is exactly `HEADER_SIZE` bytes. Implementations should return
    /// [`Error::BufferTooSmall`] on a size mismatch rather than panic.
    fn encode_header(&self, dst: &mut [u8]) -> Result<()>;

    /// The immutable payload bytes.
    fn data(&self) -> &[u8];
}

/// Size of the [`LogEntry`] wire header.
///
/// Layout, all little-endian:
///
/// ```text
/// +-----------+-----------+------------+------------------+---------+
/// | data len  | ts secs   | ts nanos   | source address   | tag     |
/// | u32 (4)   | i64 (8)   | u32 (4)    | 16 bytes (IPv6)  | u16 (2) |
/// +-----------+-----------+------------+------------------+---------+
/// ```
pub const LOG_ENTRY_HEADER_SIZE: usize = 34;

/// A timestamped, tagged log record.
///
/// IPv4 source addresses are carried in their IPv6-mapped form so the
/// address field is always 16 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    ts_secs: i64,
    ts_nanos: u32,
    src: IpAddr,
    tag: u16,
    data: Vec<u8>,
}

impl LogEntry {
    /// Create an entry stamped with the current wall-clock time.
    ///
    /// Fails with [`Error::EntryTooLarge`] when the payload exceeds
    /// [`MAX_ENTRY_SIZE`]; oversize payloads are rejected here, before they
    /// ever reach a connection.
    pub fn new(src: IpAddr, tag: u16, data: Vec<u8>) -> Result<Self> {
        let now = SystemTime::now();
        let (secs, nanos) = match now.duration_since(UNIX_EPOCH) {
            Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
            Err(e) => {
                let d = e.duration();
                (-(d.as_secs() as i64), d.subsec_nanos())
            }
        };
        Self::with_timestamp(secs, nanos, src, tag, data)
    }

    /// Create an entry with an explicit timestamp (seconds and nanoseconds
    /// relative to the Unix epoch).
    pub fn with_timestamp(
        ts_secs: i64,
        ts_nanos: u32,
        src: IpAddr,
        tag: u16,
        data: Vec<u8>,
    ) -> Result<Self> {
        if data.len() > MAX_ENTRY_SIZE {
            return Err(Error::EntryTooLarge {
                size: data.len(),
                max: MAX_ENTRY_SIZE,
            });
        }
        Ok(Self {
            ts_secs,
            ts_nanos,
            src,
            tag,
            data,
        })
    }

    /// Timestamp as (seconds, nanoseconds) relative to the Unix epoch.
    pub fn timestamp(&self) -> (i64, u32) {
        (self.ts_secs, self.ts_nanos)
    }

    /// Source address of the record.
    pub fn source(&self) -> IpAddr {
        self.src
    }

    /// Routing tag of the record.
    pub fn tag(&self) -> u16 {
        self.tag
    }

    fn src_octets(&self) -> [u8; 16] {
        match self.src {
            IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
            IpAddr::V6(v6) => v6.octets(),
        }
    }
}

impl Entry for LogEntry {
    const HEADER_SIZE: usize = LOG_ENTRY_HEADER_SIZE;

    fn encode_header(&self, dst: &mut [u8]) -> Result<()> {
        if dst.len() != Self::HEADER_SIZE {
            return Err(Error::BufferTooSmall);
        }
        dst[0..4].copy_from_slice(&(self.data.len() as u32).to_le_bytes());
        dst[4..12].copy_from_slice(&self.ts_secs.to_le_bytes());
        dst[12..16].copy_from_slice(&self.ts_nanos.to_le_bytes());
        dst[16..32].copy_from_slice(&self.src_octets());
        dst[32..34].copy_from_slice(&self.tag.to_le_bytes());
        Ok(())
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Decode a [`LogEntry`] header, returning the payload length it announces.
///
/// Used by indexer-side tooling and tests; the writer itself never parses
/// entry headers.
pub fn decode_log_entry_header(header: &[u8]) -> Result<usize> {
    if header.len() != LOG_ENTRY_HEADER_SIZE {
        return Err(Error::BufferTooSmall);
    }
    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn sample_entry(data: &[u8]) -> LogEntry {
        LogEntry::with_timestamp(
            1_700_000_000,
            500,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
            3,
            data.to_vec(),
        )
        .expect("entry within size limit")
    }

    #[test]
    fn test_header_layout() {
        let ent = sample_entry(b"hello");
        let mut header = [0u8; LOG_ENTRY_HEADER_SIZE];
        ent.encode_header(&mut header).unwrap();

        assert_eq!(&header[0..4], &5u32.to_le_bytes());
        assert_eq!(&header[4..12], &1_700_000_000i64.to_le_bytes());
        assert_eq!(&header[12..16], &500u32.to_le_bytes());
        // IPv4 mapped: ::ffff:10.0.0.7
        assert_eq!(
            &header[16..32],
            &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 10, 0, 0, 7]
        );
        assert_eq!(&header[32..34], &3u16.to_le_bytes());

        assert_eq!(decode_log_entry_header(&header).unwrap(), 5);
    }

    #[test]
    fn test_header_size_mismatch() {
        let ent = sample_entry(b"x");
        let mut short = [0u8; LOG_ENTRY_HEADER_SIZE - 1];
        assert!(matches!(
            ent.encode_header(&mut short),
            Err(Error::BufferTooSmall)
        ));
    }

    #[test]
    fn test_ipv6_source_passthrough() {
        let src: IpAddr = "fe80::1".parse().unwrap();
        let ent = LogEntry::with_timestamp(0, 0, src, 0, vec![]).unwrap();
        let mut header = [0u8; LOG_ENTRY_HEADER_SIZE];
        ent.encode_header(&mut header).unwrap();

        let v6: Ipv6Addr = "fe80::1".parse().unwrap();
        assert_eq!(&header[16..32], &v6.octets());
    }

    #[test]
    fn test_oversize_payload_rejected() {
        let err = LogEntry::with_timestamp(
            0,
            0,
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
            vec![0u8; MAX_ENTRY_SIZE + 1],
        )
        .unwrap_err();
        assert!(matches!(err, Error::EntryTooLarge { .. }));
    }

    #[test]
    fn test_now_constructor() {
        let ent = LogEntry::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1, b"now".to_vec()).unwrap();
        let (secs, _) = ent.timestamp();
        assert!(secs > 0, "wall clock should be after the epoch");
        assert_eq!(ent.data(), b"now");
        assert_eq!(ent.tag(), 1);
    }
}
