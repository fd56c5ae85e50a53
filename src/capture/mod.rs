//! Packet capture abstraction.
//!
//! This module defines the `CaptureBackend` and `CaptureHandle` traits,
//! a pnet-based implementation, an optional libpcap one, and the
//! `CaptureDispatcher` that routes captured frames through the decoders.

mod dispatcher;
#[cfg(feature = "pcap")]
mod pcap_backend;
mod pnet_backend;
mod stats;

#[cfg(test)]
pub(crate) mod mock;

pub use dispatcher::CaptureDispatcher;
#[cfg(feature = "pcap")]
pub use pcap_backend::PcapBackend;
pub use pnet_backend::PnetBackend;
pub use stats::{CaptureStats, DispatchCounters};

use std::time::SystemTime;

use crate::device::DeviceDescriptor;
use crate::error::CaptureError;

/// Default snapshot length (maximum bytes per frame)
pub const DEFAULT_SNAPLEN: usize = 65535;

/// A captured link-layer frame.
///
/// Borrows the backend's buffer, so it is only valid inside the dispatch
/// callback it was handed to.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub data: &'a [u8],
    pub timestamp: SystemTime,
}

impl<'a> RawFrame<'a> {
    pub fn new(data: &'a [u8], timestamp: SystemTime) -> Self {
        Self { data, timestamp }
    }
}

/// Options applied when opening a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Maximum bytes captured per frame
    pub snaplen: usize,
    /// Enable promiscuous mode
    pub promiscuous: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: true,
        }
    }
}

/// An open capture device.
///
/// Handles are not shared between threads; the dispatcher owns them and
/// dropping a handle releases the device.
pub trait CaptureHandle: Send {
    /// Name of the device this handle captures on.
    fn device_name(&self) -> &str;

    /// Switch the handle to non-blocking reads so `dispatch` returns as
    /// soon as the buffered frames are drained.
    fn set_nonblocking(&mut self) -> Result<(), CaptureError>;

    /// Install a backend-specific filter expression.
    fn set_filter(&mut self, expression: &str) -> Result<(), CaptureError>;

    /// Hand up to `max_events` buffered frames to `on_frame`, returning how
    /// many were processed. Zero means nothing was available.
    fn dispatch(
        &mut self,
        max_events: usize,
        on_frame: &mut dyn FnMut(RawFrame<'_>),
    ) -> Result<usize, CaptureError>;
}

/// A source of capture devices (Dependency Inversion Principle).
///
/// Lets the capture loop run against pnet, libpcap, or an in-memory
/// backend in tests without changing the loop or the decoders.
pub trait CaptureBackend: Send + Sync {
    /// Enumerate the devices currently present on the system.
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError>;

    /// Open `device` for capture.
    fn open(
        &self,
        device: &DeviceDescriptor,
        options: &CaptureOptions,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError>;
}
