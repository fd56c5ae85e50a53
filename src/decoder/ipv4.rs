//! IPv4 packet decoding (RFC 791).

use std::net::Ipv4Addr;

use pnet::packet::ipv4::{self as pnet_ipv4, Ipv4Flags};

use crate::error::{DecodeError, Layer};

/// Minimum IPv4 header size (IHL = 5).
pub const IPV4_MIN_HEADER_LEN: usize = 20;

/// IP protocol number for UDP.
pub const PROTOCOL_UDP: u8 = 17;

/// A decoded IPv4 packet borrowing the capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Packet<'a> {
    /// Header length in bytes (IHL * 4)
    pub header_length: usize,
    /// Total length as declared in the header
    pub total_length: usize,
    pub protocol: u8,
    /// Fragment offset in 8-byte units
    pub fragment_offset: u16,
    pub more_fragments: bool,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    /// Payload sized by the header, clamped to what was captured
    pub payload: &'a [u8],
}

impl<'a> Ipv4Packet<'a> {
    /// Decode an IPv4 header at the start of `data`.
    ///
    /// The IHL field is checked against the buffer before any other field
    /// is read. Snapped captures are tolerated: when the declared total
    /// length runs past the buffer the payload is clamped.
    pub fn parse(data: &'a [u8]) -> Result<Self, DecodeError> {
        let header = pnet_ipv4::Ipv4Packet::new(data).ok_or(DecodeError::Truncated {
            layer: Layer::Ipv4,
            expected: IPV4_MIN_HEADER_LEN,
            actual: data.len(),
        })?;

        let version = header.get_version();
        if version != 4 {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let header_length = usize::from(header.get_header_length()) * 4;
        if header_length < IPV4_MIN_HEADER_LEN {
            return Err(DecodeError::InvalidHeaderLength(header_length));
        }
        if data.len() < header_length {
            return Err(DecodeError::Truncated {
                layer: Layer::Ipv4,
                expected: header_length,
                actual: data.len(),
            });
        }

        let total_length = usize::from(header.get_total_length());
        if total_length < header_length {
            return Err(DecodeError::InvalidLength {
                layer: Layer::Ipv4,
                length: total_length,
                header: header_length,
            });
        }

        let end = total_length.min(data.len());

        Ok(Self {
            header_length,
            total_length,
            protocol: header.get_next_level_protocol().0,
            fragment_offset: header.get_fragment_offset(),
            more_fragments: header.get_flags() & Ipv4Flags::MoreFragments != 0,
            source: header.get_source(),
            destination: header.get_destination(),
            payload: &data[header_length..end],
        })
    }

    pub fn is_udp(&self) -> bool {
        self.protocol == PROTOCOL_UDP
    }

    /// Non-first fragments carry no transport header.
    pub fn is_trailing_fragment(&self) -> bool {
        self.fragment_offset != 0
    }
}
