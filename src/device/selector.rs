//! Device selection policy.

use std::fmt;

use tracing::info;

use super::{DeviceDescriptor, InterfaceKind};

/// Why a device was left closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Configuration restricts capture to another device id
    NotSelected,
    UnsupportedKind(InterfaceKind),
    Loopback,
    NotUp,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotSelected => write!(f, "not the configured device"),
            SkipReason::UnsupportedKind(kind) => write!(f, "unsupported type {}", kind),
            SkipReason::Loopback => write!(f, "loopback flag"),
            SkipReason::NotUp => write!(f, "not being up"),
        }
    }
}

/// Outcome of evaluating one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDecision {
    Open,
    Skip(SkipReason),
}

/// Chooses which enumerated devices to capture on.
///
/// Device ids are 0-based positions in enumeration order. They only serve
/// configuration matching and logging; every device consumes an id whether
/// or not it is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceSelector {
    /// Restrict capture to a single device id (`None` = all devices)
    device_id: Option<usize>,
}

impl DeviceSelector {
    pub fn new(device_id: Option<usize>) -> Self {
        Self { device_id }
    }

    /// Apply the selection rules to a single device, in order.
    pub fn evaluate(&self, device_id: usize, device: &DeviceDescriptor) -> DeviceDecision {
        if self.device_id.is_some_and(|wanted| wanted != device_id) {
            return DeviceDecision::Skip(SkipReason::NotSelected);
        }

        if !matches!(device.kind, InterfaceKind::Ethernet | InterfaceKind::Wireless) {
            return DeviceDecision::Skip(SkipReason::UnsupportedKind(device.kind));
        }

        if device.flags.is_loopback() {
            return DeviceDecision::Skip(SkipReason::Loopback);
        }

        if !device.flags.is_up() {
            return DeviceDecision::Skip(SkipReason::NotUp);
        }

        DeviceDecision::Open
    }

    /// Evaluate every device and return the ones to open, in enumeration
    /// order. Each decision is logged.
    pub fn select<'a>(&self, devices: &'a [DeviceDescriptor]) -> Vec<(usize, &'a DeviceDescriptor)> {
        let mut selected = Vec::new();

        for (device_id, device) in devices.iter().enumerate() {
            match self.evaluate(device_id, device) {
                DeviceDecision::Open => {
                    info!(
                        "[ID:{}] opening device {}:{}",
                        device_id, device.name, device.description
                    );
                    selected.push((device_id, device));
                }
                DeviceDecision::Skip(reason) => {
                    info!(
                        "[ID:{}] skipping device {}:{} due to {}",
                        device_id, device.name, device.description, reason
                    );
                }
            }
        }

        if selected.is_empty() {
            info!("No capture device passed selection, capture will idle");
        }

        selected
    }
}
