//! libpcap capture backend, enabled with the `pcap` feature.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pcap::{Active, Capture, ConnectionStatus, Device};
use tracing::debug;

use super::{CaptureBackend, CaptureHandle, CaptureOptions, RawFrame};
use crate::device::{DeviceDescriptor, DeviceFlags, InterfaceKind};
use crate::error::CaptureError;

/// Timeout for the blocking phase before `set_nonblocking` (milliseconds)
const DEFAULT_TIMEOUT_MS: i32 = 100;

/// Captures through libpcap, with BPF filter support.
#[derive(Debug, Clone, Copy, Default)]
pub struct PcapBackend;

impl PcapBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for PcapBackend {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        let devices = Device::list().map_err(|e| CaptureError::Enumeration(e.to_string()))?;
        Ok(devices.iter().map(describe).collect())
    }

    fn open(
        &self,
        device: &DeviceDescriptor,
        options: &CaptureOptions,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let open_error = |e: pcap::Error| CaptureError::Open {
            device: device.name.clone(),
            message: e.to_string(),
        };

        let capture = Capture::from_device(device.name.as_str())
            .map_err(open_error)?
            .promisc(options.promiscuous)
            .snaplen(i32::try_from(options.snaplen).unwrap_or(i32::MAX))
            .timeout(DEFAULT_TIMEOUT_MS)
            .open()
            .map_err(open_error)?;

        debug!("Opened pcap capture on {}", device.name);

        Ok(Box::new(PcapHandle {
            name: device.name.clone(),
            capture: Some(capture),
        }))
    }
}

struct PcapHandle {
    name: String,
    capture: Option<Capture<Active>>,
}

impl PcapHandle {
    fn capture(&mut self) -> Result<&mut Capture<Active>, CaptureError> {
        self.capture
            .as_mut()
            .ok_or_else(|| CaptureError::InvalidState(format!("{} is not open", self.name)))
    }
}

impl CaptureHandle for PcapHandle {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn set_nonblocking(&mut self) -> Result<(), CaptureError> {
        let capture = self
            .capture
            .take()
            .ok_or_else(|| CaptureError::InvalidState(format!("{} is not open", self.name)))?;
        let capture = capture
            .setnonblock()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
        self.capture = Some(capture);
        Ok(())
    }

    fn set_filter(&mut self, expression: &str) -> Result<(), CaptureError> {
        self.capture()?
            .filter(expression, true)
            .map_err(|e| CaptureError::Filter {
                expression: expression.to_string(),
                message: e.to_string(),
            })
    }

    fn dispatch(
        &mut self,
        max_events: usize,
        on_frame: &mut dyn FnMut(RawFrame<'_>),
    ) -> Result<usize, CaptureError> {
        let capture = self.capture()?;
        let mut processed = 0;

        while processed < max_events {
            match capture.next_packet() {
                Ok(packet) => {
                    let timestamp = UNIX_EPOCH
                        + Duration::new(
                            packet.header.ts.tv_sec as u64,
                            (packet.header.ts.tv_usec as u32) * 1000,
                        );
                    on_frame(RawFrame::new(packet.data, timestamp));
                    processed += 1;
                }
                Err(pcap::Error::TimeoutExpired) | Err(pcap::Error::NoMorePackets) => break,
                Err(e) => return Err(CaptureError::Backend(e.to_string())),
            }
        }

        Ok(processed)
    }
}

fn describe(device: &Device) -> DeviceDescriptor {
    let mut flags = DeviceFlags::default();
    if device.flags.is_up() {
        flags = flags.with(DeviceFlags::UP);
    }
    if device.flags.is_loopback() {
        flags = flags.with(DeviceFlags::LOOPBACK);
    }
    if device.flags.is_running() {
        flags = flags.with(DeviceFlags::RUNNING);
    }

    let kind = if device.flags.is_loopback() {
        InterfaceKind::Loopback
    } else if device.flags.is_wireless() {
        InterfaceKind::Wireless
    } else if matches!(
        device.flags.connection_status,
        ConnectionStatus::NotApplicable
    ) {
        // Pseudo devices such as "any", nflog or usbmon
        InterfaceKind::Other
    } else {
        InterfaceKind::Ethernet
    };

    DeviceDescriptor::new(
        &device.name,
        device.desc.clone().unwrap_or_default(),
        kind,
        flags,
    )
}
