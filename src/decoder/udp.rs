//! UDP datagram decoding (RFC 768).

use pnet::packet::udp::UdpPacket;

use crate::error::{DecodeError, Layer};

/// Fixed UDP header size.
pub const UDP_HEADER_LEN: usize = 8;

/// A decoded UDP datagram borrowing the capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpDatagram<'a> {
    pub source_port: u16,
    pub destination_port: u16,
    /// Length field as declared (header included)
    pub length: usize,
    pub payload: &'a [u8],
}

impl<'a> UdpDatagram<'a> {
    /// Decode a UDP header at the start of `data`.
    ///
    /// The payload is sized by the length field and clamped to the bytes
    /// actually available.
    pub fn parse(data: &'a [u8]) -> Result<Self, DecodeError> {
        let header = UdpPacket::new(data).ok_or(DecodeError::Truncated {
            layer: Layer::Udp,
            expected: UDP_HEADER_LEN,
            actual: data.len(),
        })?;

        let length = usize::from(header.get_length());
        if length < UDP_HEADER_LEN {
            return Err(DecodeError::InvalidLength {
                layer: Layer::Udp,
                length,
                header: UDP_HEADER_LEN,
            });
        }

        let end = length.min(data.len());

        Ok(Self {
            source_port: header.get_source(),
            destination_port: header.get_destination(),
            length,
            payload: &data[UDP_HEADER_LEN..end],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datagram(src: u16, dst: u16, length: u16, payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(UDP_HEADER_LEN + payload.len());
        data.extend_from_slice(&src.to_be_bytes());
        data.extend_from_slice(&dst.to_be_bytes());
        data.extend_from_slice(&length.to_be_bytes());
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_parse_ports_and_payload() {
        let data = datagram(5056, 61000, 11, &[0xf3, 0x01, 0x02]);

        let udp = UdpDatagram::parse(&data).unwrap();
        assert_eq!(udp.source_port, 5056);
        assert_eq!(udp.destination_port, 61000);
        assert_eq!(udp.length, 11);
        assert_eq!(udp.payload, &[0xf3, 0x01, 0x02]);
    }

    #[test]
    fn test_length_field_limits_payload() {
        let data = datagram(1, 2, 9, &[1, 2, 3]);
        let udp = UdpDatagram::parse(&data).unwrap();
        assert_eq!(udp.payload, &[1]);
    }

    #[test]
    fn test_payload_clamped_to_buffer() {
        let data = datagram(1, 2, 200, &[1, 2, 3]);
        let udp = UdpDatagram::parse(&data).unwrap();
        assert_eq!(udp.length, 200);
        assert_eq!(udp.payload, &[1, 2, 3]);
    }

    #[test]
    fn test_length_below_header() {
        let data = datagram(1, 2, 4, &[]);
        assert_eq!(
            UdpDatagram::parse(&data),
            Err(DecodeError::InvalidLength {
                layer: Layer::Udp,
                length: 4,
                header: UDP_HEADER_LEN,
            })
        );
    }

    #[test]
    fn test_truncated_header() {
        let data = datagram(1, 2, 8, &[]);
        assert!(matches!(
            UdpDatagram::parse(&data[..7]),
            Err(DecodeError::Truncated { layer: Layer::Udp, expected: 8, actual: 7 })
        ));
    }
}
