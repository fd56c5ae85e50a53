//! Ethernet II frame decoding.

use macaddr::MacAddr6;
use pnet::packet::ethernet::EthernetPacket;

use crate::error::{DecodeError, Layer};

/// Size of an Ethernet II header (two MACs and the ether-type).
pub const ETHERNET_HEADER_LEN: usize = 14;

/// Ether-type carried by IPv4 payloads.
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// A decoded Ethernet II frame borrowing the capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetFrame<'a> {
    pub destination: MacAddr6,
    pub source: MacAddr6,
    pub ether_type: u16,
    /// Everything after the header, up to the end of the buffer
    pub payload: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    /// Decode the fixed Ethernet header at the start of `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self, DecodeError> {
        let ethernet = EthernetPacket::new(data).ok_or(DecodeError::Truncated {
            layer: Layer::Ethernet,
            expected: ETHERNET_HEADER_LEN,
            actual: data.len(),
        })?;

        Ok(Self {
            destination: MacAddr6::from(ethernet.get_destination().octets()),
            source: MacAddr6::from(ethernet.get_source().octets()),
            ether_type: ethernet.get_ethertype().0,
            payload: &data[ETHERNET_HEADER_LEN..],
        })
    }

    pub fn is_ipv4(&self) -> bool {
        self.ether_type == ETHERTYPE_IPV4
    }
}
