//! Live capture provider.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::worker::{CaptureWorker, LoopExit};
use super::{PacketProvider, SessionState, SharedState, WORKER_THREAD_NAME};
use crate::capture::{CaptureBackend, CaptureDispatcher, CaptureStats, DispatchCounters};
use crate::config::CaptureConfig;
use crate::device::DeviceSelector;
use crate::error::CaptureError;
use crate::filter::PortFilter;
use crate::receiver::PayloadReceiver;

/// Resources of one start/stop cycle.
struct Session {
    dispatcher: Arc<Mutex<CaptureDispatcher>>,
    stop: Arc<AtomicBool>,
    worker: JoinHandle<LoopExit>,
}

/// Captures on live devices and forwards Photon payloads to a receiver.
///
/// Each `start` enumerates devices, opens the selected ones and spawns a
/// single worker thread that owns all decoding. `stop` closes the devices,
/// raises the stop flag and joins the worker, in that order.
pub struct LivePacketProvider<B: CaptureBackend> {
    backend: B,
    receiver: Arc<dyn PayloadReceiver>,
    config: CaptureConfig,
    state: Arc<SharedState>,
    counters: DispatchCounters,
    session: Option<Session>,
}

impl<B: CaptureBackend> LivePacketProvider<B> {
    pub fn new(backend: B, receiver: Arc<dyn PayloadReceiver>, config: CaptureConfig) -> Self {
        Self {
            backend,
            receiver,
            config,
            state: Arc::new(SharedState::new(SessionState::Stopped)),
            counters: DispatchCounters::new(),
            session: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Counters accumulated over every session of this provider.
    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Replace the configuration used by the next `start`.
    pub fn set_config(&mut self, config: CaptureConfig) {
        self.config = config;
    }

    fn open_session(&self) -> Result<Session, CaptureError> {
        let devices = self.backend.devices()?;
        let selected = DeviceSelector::new(self.config.network_device).select(&devices);

        let mut dispatcher = CaptureDispatcher::new(
            self.receiver.clone(),
            PortFilter::new(self.config.port()),
            self.counters.clone(),
        )
        .with_filter_expression(self.config.packet_filter.clone());

        let options = self.config.capture_options();
        for (device_id, device) in selected {
            if let Err(e) = dispatcher.open_device(&self.backend, device, &options) {
                error!("[ID:{}] failed to open device {}: {}", device_id, device.name, e);
                return Err(e);
            }
        }

        let device_count = dispatcher.device_count();
        let dispatcher = Arc::new(Mutex::new(dispatcher));
        let stop = Arc::new(AtomicBool::new(false));
        let worker = CaptureWorker {
            dispatcher: dispatcher.clone(),
            stop: stop.clone(),
            state: self.state.clone(),
            batch_size: self.config.batch_size,
            idle_backoff: self.config.idle_backoff,
        };

        self.state.set(SessionState::Running);
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())?;

        info!(
            "Capture started on {} device(s), port {}",
            device_count, self.config.port()
        );

        Ok(Session {
            dispatcher,
            stop,
            worker,
        })
    }

    /// Tear down a session: close devices, raise the stop flag, join.
    fn shutdown(session: Session) {
        session.dispatcher.lock().close();
        session.stop.store(true, Ordering::Release);

        match session.worker.join() {
            Ok(exit) => debug!("Capture worker exited: {:?}", exit),
            Err(_) => error!("Capture worker panicked"),
        }
    }
}

impl<B: CaptureBackend> PacketProvider for LivePacketProvider<B> {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.state.get() == SessionState::Running {
            debug!("Capture already running");
            return Ok(());
        }

        // The previous worker may have ended on its own
        if let Some(session) = self.session.take() {
            Self::shutdown(session);
        }

        self.state.set(SessionState::Starting);
        match self.open_session() {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                self.state.set(SessionState::Stopped);
                Err(e)
            }
        }
    }

    fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        self.state.set(SessionState::Stopping);
        Self::shutdown(session);
        self.state.set(SessionState::Stopped);
        info!("Capture stopped");
    }

    fn is_running(&self) -> bool {
        self.state.get() == SessionState::Running
    }
}

impl<B: CaptureBackend> Drop for LivePacketProvider<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::capture::mock::{ethernet_device, MockBackend, MockWire};
    use crate::decoder::test_frames::udp_frame;
    use crate::device::{DeviceDescriptor, DeviceFlags, InterfaceKind};

    fn test_config() -> CaptureConfig {
        let mut config = CaptureConfig::default();
        config.idle_backoff = Duration::from_millis(2);
        config
    }

    fn recording_provider(
        backend: MockBackend,
    ) -> (LivePacketProvider<MockBackend>, Arc<StdMutex<Vec<Vec<u8>>>>) {
        let received = Arc::new(StdMutex::new(Vec::new()));
        let sink = received.clone();
        let receiver: Arc<dyn PayloadReceiver> =
            Arc::new(move |payload: Vec<u8>| -> anyhow::Result<()> {
                sink.lock().unwrap().push(payload);
                Ok(())
            });
        (LivePacketProvider::new(backend, receiver, test_config()), received)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    fn drained(wire: &MockWire) -> bool {
        wire.pending() == 0
    }

    #[test]
    fn test_end_to_end_delivery() {
        let backend = MockBackend::single_ethernet();
        let wire = backend.wire();
        let (mut provider, received) = recording_provider(backend);

        provider.start().unwrap();
        assert!(provider.is_running());

        wire.push(udp_frame(61000, 5056, &[0x01, 0x02, 0x03]));
        assert!(wait_until(|| received.lock().unwrap().len() == 1));

        provider.stop();
        assert_eq!(*received.lock().unwrap(), vec![vec![0x01, 0x02, 0x03]]);
    }

    #[test]
    fn test_receiver_runs_on_named_worker() {
        let backend = MockBackend::single_ethernet();
        let wire = backend.wire();
        let threads = Arc::new(StdMutex::new(Vec::new()));
        let sink = threads.clone();
        let receiver: Arc<dyn PayloadReceiver> =
            Arc::new(move |_payload: Vec<u8>| -> anyhow::Result<()> {
                let name = thread::current().name().map(str::to_string);
                sink.lock().unwrap().push(name);
                Ok(())
            });
        let mut provider = LivePacketProvider::new(backend, receiver, test_config());

        provider.start().unwrap();
        wire.push(udp_frame(61000, 5056, &[0x01]));
        assert!(wait_until(|| threads.lock().unwrap().len() == 1));
        provider.stop();

        assert_eq!(
            *threads.lock().unwrap(),
            vec![Some(WORKER_THREAD_NAME.to_string())]
        );
    }

    #[test]
    fn test_end_to_end_other_port() {
        let backend = MockBackend::single_ethernet();
        let wire = backend.wire();
        let (mut provider, received) = recording_provider(backend);

        provider.start().unwrap();
        wire.push(udp_frame(61000, 80, &[0x01, 0x02, 0x03]));
        assert!(wait_until(|| drained(&wire)));
        provider.stop();

        assert!(received.lock().unwrap().is_empty());
        assert_eq!(provider.stats().frames_filtered, 1);
    }

    #[test]
    fn test_start_stop_start() {
        let backend = MockBackend::single_ethernet();
        let wire = backend.wire();
        let (mut provider, received) = recording_provider(backend);

        provider.start().unwrap();
        assert_eq!(wire.open_handles(), 1);
        provider.stop();
        assert!(!provider.is_running());
        assert_eq!(provider.state(), SessionState::Stopped);
        assert_eq!(wire.open_handles(), 0);

        // Nothing is delivered while stopped
        wire.push(udp_frame(5056, 61000, &[7]));
        thread::sleep(Duration::from_millis(20));
        assert!(received.lock().unwrap().is_empty());

        provider.start().unwrap();
        assert!(provider.is_running());
        assert_eq!(wire.open_handles(), 1);
        assert_eq!(wire.opened_total(), 2);
        assert!(wait_until(|| received.lock().unwrap().len() == 1));

        provider.stop();
        assert_eq!(wire.open_handles(), 0);
    }

    #[test]
    fn test_no_delivery_after_stop_returns() {
        let backend = MockBackend::single_ethernet();
        let wire = backend.wire();
        let (mut provider, received) = recording_provider(backend);

        provider.start().unwrap();
        for i in 0..200u8 {
            wire.push(udp_frame(5056, 61000, &[i]));
        }
        provider.stop();

        let delivered = received.lock().unwrap().len();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(received.lock().unwrap().len(), delivered);
    }

    #[test]
    fn test_stop_when_never_started() {
        let (mut provider, _) = recording_provider(MockBackend::single_ethernet());
        provider.stop();
        provider.stop();
        assert_eq!(provider.state(), SessionState::Stopped);
    }

    #[test]
    fn test_start_is_idempotent() {
        let backend = MockBackend::single_ethernet();
        let wire = backend.wire();
        let (mut provider, _) = recording_provider(backend);

        provider.start().unwrap();
        provider.start().unwrap();
        assert_eq!(wire.opened_total(), 1);
        provider.stop();
    }

    #[test]
    fn test_failing_receiver_keeps_loop_alive() {
        let backend = MockBackend::single_ethernet();
        let wire = backend.wire();
        let attempts = Arc::new(StdMutex::new(0usize));
        let counter = attempts.clone();
        let receiver: Arc<dyn PayloadReceiver> =
            Arc::new(move |_payload: Vec<u8>| -> anyhow::Result<()> {
                *counter.lock().unwrap() += 1;
                anyhow::bail!("always fails")
            });
        let mut provider = LivePacketProvider::new(backend, receiver, test_config());

        provider.start().unwrap();
        wire.push(udp_frame(5056, 61000, &[1]));
        assert!(wait_until(|| *attempts.lock().unwrap() == 1));
        wire.push(udp_frame(5056, 61000, &[2]));
        wire.push(udp_frame(61000, 5056, &[3]));
        assert!(wait_until(|| *attempts.lock().unwrap() == 3));

        assert!(provider.is_running());
        provider.stop();
        assert_eq!(provider.stats().receiver_failures, 3);
    }

    #[test]
    fn test_backend_fault_stops_session() {
        let backend = MockBackend::single_ethernet();
        let wire = backend.wire();
        let (mut provider, _) = recording_provider(backend);

        provider.start().unwrap();
        wire.fail_next(CaptureError::Backend("device vanished".to_string()));
        assert!(wait_until(|| !provider.is_running()));
        assert_eq!(provider.state(), SessionState::Stopped);

        // A faulted session can be started again
        provider.start().unwrap();
        assert!(provider.is_running());
        assert_eq!(wire.open_handles(), 1);
        provider.stop();
        assert_eq!(wire.open_handles(), 0);
    }

    #[test]
    fn test_no_selectable_device_still_runs() {
        let backend = MockBackend::new(vec![DeviceDescriptor::new(
            "lo",
            "Loopback",
            InterfaceKind::Loopback,
            DeviceFlags::new(DeviceFlags::UP | DeviceFlags::LOOPBACK),
        )]);
        let wire = backend.wire();
        let (mut provider, _) = recording_provider(backend);

        provider.start().unwrap();
        assert!(provider.is_running());
        assert_eq!(wire.opened_total(), 0);
        provider.stop();
        assert!(!provider.is_running());
    }

    #[test]
    fn test_configured_device_only() {
        let backend = MockBackend::new(vec![ethernet_device("eth0"), ethernet_device("eth1")]);
        let wire = backend.wire();
        let (mut provider, _) = recording_provider(backend);
        let mut config = test_config();
        config.network_device = Some(1);
        config.packet_filter = Some("udp".to_string());
        provider.set_config(config);

        provider.start().unwrap();
        assert_eq!(wire.opened_total(), 1);
        assert_eq!(wire.filters(), vec!["udp".to_string()]);
        provider.stop();
    }

    #[test]
    fn test_drop_stops_capture() {
        let backend = MockBackend::single_ethernet();
        let wire = backend.wire();
        let (mut provider, _) = recording_provider(backend);

        provider.start().unwrap();
        drop(provider);
        assert_eq!(wire.open_handles(), 0);
    }
}
