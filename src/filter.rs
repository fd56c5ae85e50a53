//! Port filter for the application protocol.

use crate::decoder::UdpDatagram;

/// UDP port used by the Photon protocol in both directions.
pub const PHOTON_PORT: u16 = 5056;

/// Returns true if either side of the datagram uses `port`.
///
/// The port shows up as the source on server-to-client traffic and as the
/// destination on client-to-server traffic, so both fields are checked.
pub fn matches_port(udp: &UdpDatagram<'_>, port: u16) -> bool {
    udp.source_port == port || udp.destination_port == port
}

/// Predicate selecting datagrams on a single well-known port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortFilter {
    port: u16,
}

impl PortFilter {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn matches(&self, udp: &UdpDatagram<'_>) -> bool {
        matches_port(udp, self.port)
    }
}

impl Default for PortFilter {
    fn default() -> Self {
        Self::new(PHOTON_PORT)
    }
}
