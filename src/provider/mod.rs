//! Capture session lifecycle.
//!
//! This module defines the `PacketProvider` trait and the live
//! implementation that runs the capture loop on a dedicated worker.

mod live;
mod worker;

pub use live::LivePacketProvider;

/// Name of the thread that runs the capture loop and the payload receiver.
pub const WORKER_THREAD_NAME: &str = "photon-capture";

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::CaptureError;

/// A startable source of Photon payloads.
pub trait PacketProvider {
    /// Open the configured devices and start delivering payloads.
    /// Does nothing if already running.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop delivering payloads and release every device. Once this
    /// returns no further payload is delivered. Does nothing if stopped.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Lifecycle state of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Starting,
            2 => SessionState::Running,
            3 => SessionState::Stopping,
            _ => SessionState::Stopped,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Stopped => write!(f, "stopped"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Running => write!(f, "running"),
            SessionState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Session state shared between the controller and its worker.
#[derive(Debug)]
pub(crate) struct SharedState(AtomicU8);

impl SharedState {
    pub(crate) fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Move from `from` to `to`; fails if another transition got there first.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}
