//! Frame decoding module.
//!
//! Stateless decoders for the three layers between a captured link-layer
//! frame and the application payload. Each decoder borrows the capture
//! buffer and never allocates; `decode_udp` chains them.

mod ethernet;
mod ipv4;
mod udp;

pub use ethernet::{EthernetFrame, ETHERNET_HEADER_LEN, ETHERTYPE_IPV4};
pub use ipv4::{Ipv4Packet, IPV4_MIN_HEADER_LEN, PROTOCOL_UDP};
pub use udp::{UdpDatagram, UDP_HEADER_LEN};

use crate::error::DecodeError;

/// Decode an Ethernet frame down to its UDP datagram.
///
/// Stops at the first layer that fails or carries something other than
/// IPv4/UDP. Trailing IPv4 fragments are rejected since they have no UDP
/// header of their own.
pub fn decode_udp(frame: &[u8]) -> Result<UdpDatagram<'_>, DecodeError> {
    let ethernet = EthernetFrame::parse(frame)?;
    if !ethernet.is_ipv4() {
        return Err(DecodeError::UnsupportedEtherType(ethernet.ether_type));
    }

    let ipv4 = Ipv4Packet::parse(ethernet.payload)?;
    if !ipv4.is_udp() {
        return Err(DecodeError::UnsupportedProtocol(ipv4.protocol));
    }
    if ipv4.is_trailing_fragment() {
        return Err(DecodeError::Fragmented {
            offset: ipv4.fragment_offset,
        });
    }

    UdpDatagram::parse(ipv4.payload)
}
