//! Capture statistics

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of the dispatcher's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames handed to the dispatcher by the backend
    pub frames_seen: u64,
    /// Bytes across all seen frames
    pub bytes_seen: u64,
    /// Frames that were not a decodable IPv4/UDP datagram
    pub frames_malformed: u64,
    /// UDP datagrams on other ports
    pub frames_filtered: u64,
    /// Payloads accepted by the receiver
    pub payloads_delivered: u64,
    /// Payloads the receiver failed on
    pub receiver_failures: u64,
}

impl fmt::Display for CaptureStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frames: {} ({} bytes) | Malformed: {} | Other ports: {} | Delivered: {} | Receiver failures: {}",
            self.frames_seen,
            self.bytes_seen,
            self.frames_malformed,
            self.frames_filtered,
            self.payloads_delivered,
            self.receiver_failures
        )
    }
}

/// Thread-safe counters updated by the capture worker.
///
/// Clones share the same counters, so the provider can read them while the
/// worker writes.
#[derive(Debug, Clone, Default)]
pub struct DispatchCounters {
    frames_seen: Arc<AtomicU64>,
    bytes_seen: Arc<AtomicU64>,
    frames_malformed: Arc<AtomicU64>,
    frames_filtered: Arc<AtomicU64>,
    payloads_delivered: Arc<AtomicU64>,
    receiver_failures: Arc<AtomicU64>,
}

impl DispatchCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&self, len: usize) {
        self.frames_seen.fetch_add(1, Ordering::Relaxed);
        self.bytes_seen.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.frames_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.frames_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.payloads_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_receiver_failure(&self) {
        self.receiver_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            frames_seen: self.frames_seen.load(Ordering::Relaxed),
            bytes_seen: self.bytes_seen.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            frames_filtered: self.frames_filtered.load(Ordering::Relaxed),
            payloads_delivered: self.payloads_delivered.load(Ordering::Relaxed),
            receiver_failures: self.receiver_failures.load(Ordering::Relaxed),
        }
    }
}
