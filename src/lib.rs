//! Passive capture of Photon traffic.
//!
//! Opens live network devices, decodes every captured frame through
//! Ethernet, IPv4 and UDP, keeps the datagrams on the Photon port (5056)
//! and hands their payloads to a `PayloadReceiver`, all on one background
//! worker that can be started and stopped repeatedly.

pub mod capture;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod filter;
pub mod provider;
pub mod receiver;

pub use capture::{
    CaptureBackend, CaptureHandle, CaptureOptions, CaptureStats, PnetBackend, RawFrame,
};
#[cfg(feature = "pcap")]
pub use capture::PcapBackend;
pub use config::CaptureConfig;
pub use device::{DeviceDescriptor, DeviceFlags, DeviceSelector, InterfaceKind};
pub use error::{CaptureError, ConfigError, DecodeError};
pub use filter::{PortFilter, PHOTON_PORT};
pub use provider::{LivePacketProvider, PacketProvider, SessionState, WORKER_THREAD_NAME};
pub use receiver::{ConsoleReceiver, PayloadReceiver};
