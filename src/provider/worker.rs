//! The capture loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error};

use super::{SessionState, SharedState};
use crate::capture::CaptureDispatcher;

/// Why the capture loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopExit {
    /// The stop flag was raised
    Cancelled,
    /// Handles were disposed or invalid underneath the loop
    Disposed,
    /// Unexpected failure, the session is not retried
    Fault,
}

/// Everything the worker thread owns for one session.
pub(crate) struct CaptureWorker {
    pub(crate) dispatcher: Arc<Mutex<CaptureDispatcher>>,
    pub(crate) stop: Arc<AtomicBool>,
    pub(crate) state: Arc<SharedState>,
    pub(crate) batch_size: usize,
    pub(crate) idle_backoff: Duration,
}

impl CaptureWorker {
    /// Poll the dispatcher until stopped or failed.
    ///
    /// Sleeps only after a dispatch call that found nothing; a busy call
    /// is followed immediately by the next one.
    pub(crate) fn run(self) -> LoopExit {
        let _exit = ExitGuard(&self.state);

        while !self.stop.load(Ordering::Acquire) {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                self.dispatcher.lock().dispatch(self.batch_size)
            }));

            match result {
                Ok(Ok(0)) => thread::sleep(self.idle_backoff),
                Ok(Ok(_)) => {}
                Ok(Err(e)) if e.is_graceful_stop() => {
                    debug!("Capture loop ending: {}", e);
                    return LoopExit::Disposed;
                }
                Ok(Err(e)) => {
                    error!("Capture loop failed: {}", e);
                    return LoopExit::Fault;
                }
                Err(_) => {
                    error!("Capture loop panicked");
                    return LoopExit::Fault;
                }
            }
        }

        debug!("Capture loop cancelled");
        LoopExit::Cancelled
    }
}

/// Marks the session stopped when the worker leaves on its own, including
/// by unwinding. A stop in progress owns the final transition instead.
struct ExitGuard<'a>(&'a SharedState);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.transition(SessionState::Running, SessionState::Stopped);
    }
}
