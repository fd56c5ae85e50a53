//! pnet-based capture backend.

use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use pnet::datalink::{self, Channel, Config, DataLinkReceiver, NetworkInterface};
use pnet::util::MacAddr;
use tracing::{debug, warn};

use super::{CaptureBackend, CaptureHandle, CaptureOptions, RawFrame};
use crate::device::{DeviceDescriptor, DeviceFlags, InterfaceKind};
use crate::error::CaptureError;

/// Read timeout used until the handle is switched to non-blocking
const BLOCKING_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// IFF_RUNNING, identical on Linux and the BSDs
const IFF_RUNNING: u32 = 0x40;

/// Captures through pnet's datalink channels.
///
/// pnet has no kernel filter support, so filter expressions are accepted
/// and ignored; the port filter still applies in user space.
#[derive(Debug, Clone, Copy, Default)]
pub struct PnetBackend;

impl PnetBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for PnetBackend {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        Ok(datalink::interfaces().iter().map(describe).collect())
    }

    fn open(
        &self,
        device: &DeviceDescriptor,
        options: &CaptureOptions,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == device.name)
            .ok_or_else(|| CaptureError::Open {
                device: device.name.clone(),
                message: "interface no longer present".to_string(),
            })?;

        let rx = open_channel(&interface, options, BLOCKING_READ_TIMEOUT)?;
        debug!("Opened pnet channel on {}", interface.name);

        Ok(Box::new(PnetHandle {
            interface,
            options: options.clone(),
            rx,
        }))
    }
}

/// An open pnet datalink channel (receive side only).
struct PnetHandle {
    interface: NetworkInterface,
    options: CaptureOptions,
    rx: Box<dyn DataLinkReceiver>,
}

impl CaptureHandle for PnetHandle {
    fn device_name(&self) -> &str {
        &self.interface.name
    }

    fn set_nonblocking(&mut self) -> Result<(), CaptureError> {
        // pnet fixes the timeout at channel creation, so reopen with a zero
        // timeout: reads then return TimedOut as soon as the ring is empty.
        self.rx = open_channel(&self.interface, &self.options, Duration::ZERO)?;
        Ok(())
    }

    fn set_filter(&mut self, expression: &str) -> Result<(), CaptureError> {
        warn!(
            "pnet backend does not support filter expressions, ignoring '{}' on {}",
            expression, self.interface.name
        );
        Ok(())
    }

    fn dispatch(
        &mut self,
        max_events: usize,
        on_frame: &mut dyn FnMut(RawFrame<'_>),
    ) -> Result<usize, CaptureError> {
        let mut processed = 0;

        while processed < max_events {
            match self.rx.next() {
                Ok(data) => {
                    let len = data.len().min(self.options.snaplen);
                    on_frame(RawFrame::new(&data[..len], SystemTime::now()));
                    processed += 1;
                }
                Err(e) if is_empty_read(&e) => break,
                Err(e) => return Err(CaptureError::Io(e)),
            }
        }

        Ok(processed)
    }
}

fn is_empty_read(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn open_channel(
    interface: &NetworkInterface,
    options: &CaptureOptions,
    read_timeout: Duration,
) -> Result<Box<dyn DataLinkReceiver>, CaptureError> {
    let config = Config {
        read_timeout: Some(read_timeout),
        promiscuous: options.promiscuous,
        ..Config::default()
    };

    match datalink::channel(interface, config) {
        Ok(Channel::Ethernet(_tx, rx)) => Ok(rx),
        Ok(_) => Err(CaptureError::Open {
            device: interface.name.clone(),
            message: "unsupported channel type".to_string(),
        }),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Err(CaptureError::InsufficientPermissions(interface.name.clone()))
        }
        Err(e) => Err(CaptureError::Open {
            device: interface.name.clone(),
            message: e.to_string(),
        }),
    }
}

fn describe(iface: &NetworkInterface) -> DeviceDescriptor {
    let mut flags = DeviceFlags::default();
    if iface.is_up() {
        flags = flags.with(DeviceFlags::UP);
    }
    if iface.is_loopback() {
        flags = flags.with(DeviceFlags::LOOPBACK);
    }
    if iface.flags & IFF_RUNNING != 0 {
        flags = flags.with(DeviceFlags::RUNNING);
    }
    if iface.is_broadcast() {
        flags = flags.with(DeviceFlags::BROADCAST);
    }
    if iface.is_multicast() {
        flags = flags.with(DeviceFlags::MULTICAST);
    }
    if iface.is_point_to_point() {
        flags = flags.with(DeviceFlags::POINT_TO_POINT);
    }

    let description = if iface.description.is_empty() {
        iface
            .ips
            .iter()
            .map(|ip| ip.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        iface.description.clone()
    };

    DeviceDescriptor::new(&iface.name, description, interface_kind(iface), flags)
}

fn interface_kind(iface: &NetworkInterface) -> InterfaceKind {
    if iface.is_loopback() {
        return InterfaceKind::Loopback;
    }

    if is_wireless(&iface.name) {
        return InterfaceKind::Wireless;
    }

    // Tunnels and other layer-3 links have no hardware address
    match iface.mac {
        Some(mac) if mac != MacAddr::zero() && !iface.is_point_to_point() => {
            InterfaceKind::Ethernet
        }
        _ => InterfaceKind::Other,
    }
}

/// Linux exposes 802.11 devices with a `wireless` or `phy80211` entry.
fn is_wireless(name: &str) -> bool {
    let sysfs = Path::new("/sys/class/net").join(name);
    sysfs.join("wireless").exists() || sysfs.join("phy80211").exists()
}
