use std::fmt;

use thiserror::Error;

/// Protocol layer a decode failure happened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Ethernet,
    Ipv4,
    Udp,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Ethernet => write!(f, "ethernet"),
            Layer::Ipv4 => write!(f, "ipv4"),
            Layer::Udp => write!(f, "udp"),
        }
    }
}

/// Reasons a captured frame is not a decodable UDP datagram.
///
/// These are classifications, not faults: hostile or truncated capture
/// data is expected and simply dropped by the dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{layer} header truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        layer: Layer,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported ether-type {0:#06x}")]
    UnsupportedEtherType(u16),

    #[error("unsupported IP version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid IPv4 header length {0}")]
    InvalidHeaderLength(usize),

    #[error("{layer} length field {length} is shorter than its header ({header})")]
    InvalidLength {
        layer: Layer,
        length: usize,
        header: usize,
    },

    #[error("unsupported IP protocol {0}")]
    UnsupportedProtocol(u8),

    /// Non-first fragment of a datagram; its transport header is elsewhere.
    #[error("IPv4 fragment at offset {offset} has no transport header")]
    Fragmented { offset: u16 },
}

/// Errors raised by capture backends and the capture session.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture handles have been disposed")]
    Disposed,

    #[error("invalid capture state: {0}")]
    InvalidState(String),

    #[error("failed to enumerate devices: {0}")]
    Enumeration(String),

    #[error("failed to open device '{device}': {message}")]
    Open { device: String, message: String },

    #[error("insufficient permissions to capture on '{0}' (try running as root)")]
    InsufficientPermissions(String),

    #[error("invalid filter expression '{expression}': {message}")]
    Filter { expression: String, message: String },

    #[error("capture backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Whether the error means the handles were torn down underneath the
    /// worker, which ends the capture loop without being reported as a fault.
    pub fn is_graceful_stop(&self) -> bool {
        matches!(self, CaptureError::Disposed | CaptureError::InvalidState(_))
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graceful_stop_classification() {
        assert!(CaptureError::Disposed.is_graceful_stop());
        assert!(CaptureError::InvalidState("closed".to_string()).is_graceful_stop());
        assert!(!CaptureError::Backend("read failed".to_string()).is_graceful_stop());
        assert!(!CaptureError::Io(std::io::Error::other("boom")).is_graceful_stop());
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::Truncated {
            layer: Layer::Udp,
            expected: 8,
            actual: 3,
        };
        assert_eq!(err.to_string(), "udp header truncated: expected 8 bytes, got 3");
        assert_eq!(
            DecodeError::UnsupportedEtherType(0x86dd).to_string(),
            "unsupported ether-type 0x86dd"
        );
        assert_eq!(
            DecodeError::Fragmented { offset: 185 }.to_string(),
            "IPv4 fragment at offset 185 has no transport header"
        );
    }
}
