//! Routes captured frames from open devices to the payload receiver.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace};

use super::{CaptureBackend, CaptureHandle, CaptureOptions, DispatchCounters, RawFrame};
use crate::decoder;
use crate::device::DeviceDescriptor;
use crate::error::CaptureError;
use crate::filter::PortFilter;
use crate::receiver::PayloadReceiver;

/// Owns the open capture handles for one session.
///
/// Every frame runs Ethernet -> IPv4 -> UDP decoding and the port filter on
/// the calling thread; only survivors reach the receiver, as an owned copy
/// since the capture buffer is reused after the callback.
pub struct CaptureDispatcher {
    handles: Vec<Box<dyn CaptureHandle>>,
    filter_expression: Option<String>,
    port_filter: PortFilter,
    receiver: Arc<dyn PayloadReceiver>,
    counters: DispatchCounters,
    disposed: bool,
}

impl CaptureDispatcher {
    pub fn new(
        receiver: Arc<dyn PayloadReceiver>,
        port_filter: PortFilter,
        counters: DispatchCounters,
    ) -> Self {
        Self {
            handles: Vec::new(),
            filter_expression: None,
            port_filter,
            receiver,
            counters,
            disposed: false,
        }
    }

    /// Filter expression installed on every device opened afterwards.
    pub fn with_filter_expression(mut self, expression: Option<String>) -> Self {
        self.filter_expression = expression.filter(|e| !e.trim().is_empty());
        self
    }

    /// Open `device` non-blocking and install the filter expression.
    pub fn open_device(
        &mut self,
        backend: &dyn CaptureBackend,
        device: &DeviceDescriptor,
        options: &CaptureOptions,
    ) -> Result<(), CaptureError> {
        if self.disposed {
            return Err(CaptureError::Disposed);
        }

        let mut handle = backend.open(device, options)?;
        handle.set_nonblocking()?;
        if let Some(expression) = &self.filter_expression {
            handle.set_filter(expression)?;
            debug!("Applied filter '{}' on {}", expression, device.name);
        }

        self.handles.push(handle);
        Ok(())
    }

    pub fn device_count(&self) -> usize {
        self.handles.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Process up to `max_events` buffered frames per device.
    ///
    /// Returns the number of frames processed; zero means nothing was
    /// waiting. Fails with `CaptureError::Disposed` once closed.
    pub fn dispatch(&mut self, max_events: usize) -> Result<usize, CaptureError> {
        if self.disposed {
            return Err(CaptureError::Disposed);
        }

        let Self {
            handles,
            port_filter,
            receiver,
            counters,
            ..
        } = self;

        let mut processed = 0;
        for handle in handles.iter_mut() {
            processed += handle.dispatch(max_events, &mut |frame: RawFrame<'_>| {
                process_frame(frame, port_filter, &**receiver, counters)
            })?;
        }

        Ok(processed)
    }

    /// Release every device. Later dispatch calls fail with `Disposed`.
    pub fn close(&mut self) {
        if self.disposed {
            return;
        }

        for handle in self.handles.drain(..) {
            debug!("Closing capture device {}", handle.device_name());
        }
        self.disposed = true;
    }
}

impl Drop for CaptureDispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn process_frame(
    frame: RawFrame<'_>,
    port_filter: &PortFilter,
    receiver: &dyn PayloadReceiver,
    counters: &DispatchCounters,
) {
    counters.record_frame(frame.data.len());

    let udp = match decoder::decode_udp(frame.data) {
        Ok(udp) => udp,
        Err(_) => {
            counters.record_malformed();
            return;
        }
    };

    if !port_filter.matches(&udp) {
        counters.record_filtered();
        return;
    }

    deliver(receiver, udp.payload.to_vec(), counters);
}

/// Isolation boundary: nothing the receiver does may reach the capture loop.
fn deliver(receiver: &dyn PayloadReceiver, payload: Vec<u8>, counters: &DispatchCounters) {
    match panic::catch_unwind(AssertUnwindSafe(|| receiver.receive_payload(payload))) {
        Ok(Ok(())) => counters.record_delivered(),
        Ok(Err(e)) => {
            counters.record_receiver_failure();
            trace!("Payload receiver failed: {:#}", e);
        }
        Err(_) => {
            counters.record_receiver_failure();
            trace!("Payload receiver panicked");
        }
    }
}
