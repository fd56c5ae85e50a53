//! In-memory capture backend for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use super::{CaptureBackend, CaptureHandle, CaptureOptions, RawFrame};
use crate::device::{DeviceDescriptor, DeviceFlags, InterfaceKind};
use crate::error::CaptureError;

/// State shared between a `MockBackend` and every handle it opened.
#[derive(Default)]
pub struct MockWire {
    frames: Mutex<VecDeque<Vec<u8>>>,
    next_error: Mutex<Option<CaptureError>>,
    filters: Mutex<Vec<String>>,
    open_handles: AtomicUsize,
    opened_total: AtomicUsize,
    nonblocking: AtomicUsize,
}

impl MockWire {
    /// Queue a frame for the next dispatch.
    pub fn push(&self, frame: Vec<u8>) {
        self.frames.lock().unwrap().push_back(frame);
    }

    /// Make the next dispatch call fail with `error`.
    pub fn fail_next(&self, error: CaptureError) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    pub fn pending(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn opened_total(&self) -> usize {
        self.opened_total.load(Ordering::SeqCst)
    }

    pub fn nonblocking_handles(&self) -> usize {
        self.nonblocking.load(Ordering::SeqCst)
    }

    pub fn filters(&self) -> Vec<String> {
        self.filters.lock().unwrap().clone()
    }
}

pub struct MockBackend {
    devices: Vec<DeviceDescriptor>,
    wire: Arc<MockWire>,
}

impl MockBackend {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices,
            wire: Arc::new(MockWire::default()),
        }
    }

    /// A backend with a single capturable Ethernet device.
    pub fn single_ethernet() -> Self {
        Self::new(vec![ethernet_device("eth0")])
    }

    pub fn wire(&self) -> Arc<MockWire> {
        self.wire.clone()
    }
}

pub fn ethernet_device(name: &str) -> DeviceDescriptor {
    DeviceDescriptor::new(
        name,
        "Mock Ethernet",
        InterfaceKind::Ethernet,
        DeviceFlags::new(DeviceFlags::UP | DeviceFlags::RUNNING),
    )
}

impl CaptureBackend for MockBackend {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        Ok(self.devices.clone())
    }

    fn open(
        &self,
        device: &DeviceDescriptor,
        _options: &CaptureOptions,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        self.wire.open_handles.fetch_add(1, Ordering::SeqCst);
        self.wire.opened_total.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockHandle {
            name: device.name.clone(),
            wire: self.wire.clone(),
            nonblocking: false,
        }))
    }
}

struct MockHandle {
    name: String,
    wire: Arc<MockWire>,
    nonblocking: bool,
}

impl CaptureHandle for MockHandle {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn set_nonblocking(&mut self) -> Result<(), CaptureError> {
        if !self.nonblocking {
            self.nonblocking = true;
            self.wire.nonblocking.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn set_filter(&mut self, expression: &str) -> Result<(), CaptureError> {
        self.wire.filters.lock().unwrap().push(expression.to_string());
        Ok(())
    }

    fn dispatch(
        &mut self,
        max_events: usize,
        on_frame: &mut dyn FnMut(RawFrame<'_>),
    ) -> Result<usize, CaptureError> {
        if let Some(error) = self.wire.next_error.lock().unwrap().take() {
            return Err(error);
        }

        let mut processed = 0;
        while processed < max_events {
            // Release the queue lock before the callback runs
            let frame = self.wire.frames.lock().unwrap().pop_front();
            match frame {
                Some(frame) => {
                    on_frame(RawFrame::new(&frame, SystemTime::now()));
                    processed += 1;
                }
                None => break,
            }
        }

        Ok(processed)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if self.nonblocking {
            self.wire.nonblocking.fetch_sub(1, Ordering::SeqCst);
        }
        self.wire.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}
