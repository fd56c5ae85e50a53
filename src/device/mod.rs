//! Capture device descriptions and selection.
//!
//! Descriptors come from a `CaptureBackend` once per session start and are
//! only read here; `DeviceSelector` decides which of them get opened.

mod selector;

pub use selector::{DeviceDecision, DeviceSelector, SkipReason};

use std::fmt;

/// Link type of a network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Ethernet,
    Wireless,
    Loopback,
    Other,
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceKind::Ethernet => write!(f, "Ethernet"),
            InterfaceKind::Wireless => write!(f, "Wireless80211"),
            InterfaceKind::Loopback => write!(f, "Loopback"),
            InterfaceKind::Other => write!(f, "Other"),
        }
    }
}

/// Interface status flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFlags {
    bits: u32,
}

impl DeviceFlags {
    pub const UP: u32 = 0x01;
    pub const LOOPBACK: u32 = 0x02;
    pub const RUNNING: u32 = 0x04;
    pub const BROADCAST: u32 = 0x08;
    pub const MULTICAST: u32 = 0x10;
    pub const POINT_TO_POINT: u32 = 0x20;

    pub fn new(bits: u32) -> Self {
        Self { bits }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn contains(&self, flag: u32) -> bool {
        self.bits & flag == flag
    }

    pub fn with(mut self, flag: u32) -> Self {
        self.bits |= flag;
        self
    }

    pub fn is_up(&self) -> bool {
        self.contains(Self::UP)
    }

    pub fn is_loopback(&self) -> bool {
        self.contains(Self::LOOPBACK)
    }
}

impl fmt::Display for DeviceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(u32, &str); 6] = [
            (DeviceFlags::UP, "UP"),
            (DeviceFlags::LOOPBACK, "LOOPBACK"),
            (DeviceFlags::RUNNING, "RUNNING"),
            (DeviceFlags::BROADCAST, "BROADCAST"),
            (DeviceFlags::MULTICAST, "MULTICAST"),
            (DeviceFlags::POINT_TO_POINT, "POINTTOPOINT"),
        ];

        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join(","))
    }
}

/// A network interface as reported by the capture backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// System name (e.g., "eth0", "wlan0")
    pub name: String,
    /// Human-readable description, may be empty
    pub description: String,
    pub kind: InterfaceKind,
    pub flags: DeviceFlags,
}

impl DeviceDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: InterfaceKind,
        flags: DeviceFlags,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            flags,
        }
    }
}
