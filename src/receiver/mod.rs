//! Payload delivery.
//!
//! This module defines the `PayloadReceiver` trait, the single seam between
//! the capture core and whatever decodes the application protocol.

mod console_receiver;

pub use console_receiver::ConsoleReceiver;

/// Consumer of UDP payloads that passed the port filter.
///
/// Called synchronously on the capture worker, once per datagram, in
/// capture order. Implementations should return quickly: time spent here
/// is time the worker is not draining the capture buffers. Errors (and
/// panics) are swallowed by the dispatcher and never stop capture.
///
/// A caught panic still passes through the process panic hook first, which
/// by default prints to stderr once per panic. A receiver that panics on
/// every datagram should be paired with a hook that filters on
/// `WORKER_THREAD_NAME`, as the `photon-capture` binary installs.
pub trait PayloadReceiver: Send + Sync {
    /// Receive one UDP payload.
    fn receive_payload(&self, payload: Vec<u8>) -> anyhow::Result<()>;
}

impl<F> PayloadReceiver for F
where
    F: Fn(Vec<u8>) -> anyhow::Result<()> + Send + Sync,
{
    fn receive_payload(&self, payload: Vec<u8>) -> anyhow::Result<()> {
        self(payload)
    }
}
