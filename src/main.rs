//! photon-capture - watches the network for Photon (UDP 5056) traffic.

use std::panic;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use photon_capture::config::DEFAULT_CONFIG_PATH;
use photon_capture::device::DeviceDecision;
use photon_capture::{
    CaptureBackend, CaptureConfig, ConsoleReceiver, DeviceSelector, LivePacketProvider,
    PacketProvider, WORKER_THREAD_NAME,
};

/// How often the main thread checks whether capture died on its own
const LIVENESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "photon-capture")]
#[command(about = "Passive capture of Photon UDP traffic")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List capture devices and whether they would be opened
    Devices {
        /// Evaluate selection as if restricted to this device id
        #[arg(short, long)]
        device: Option<usize>,
    },
    /// Capture until Ctrl+C, printing every Photon payload
    Capture {
        /// Capture only on this device id
        #[arg(short, long)]
        device: Option<usize>,
        /// Backend filter expression (BPF with the pcap backend)
        #[arg(short, long)]
        filter: Option<String>,
        /// Dump whole payloads instead of a preview
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CaptureConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Devices { device } => list_devices(device.or(config.network_device)),
        Commands::Capture {
            device,
            filter,
            verbose,
        } => {
            let mut config = config;
            if device.is_some() {
                config.network_device = device;
            }
            if filter.is_some() {
                config.packet_filter = filter;
            }
            capture(config, verbose)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "pcap")]
fn backend() -> photon_capture::PcapBackend {
    photon_capture::PcapBackend::new()
}

#[cfg(not(feature = "pcap"))]
fn backend() -> photon_capture::PnetBackend {
    photon_capture::PnetBackend::new()
}

fn list_devices(device: Option<usize>) -> Result<()> {
    let devices = backend().devices().context("failed to enumerate devices")?;
    let selector = DeviceSelector::new(device);

    for (id, device) in devices.iter().enumerate() {
        let decision = match selector.evaluate(id, device) {
            DeviceDecision::Open => "capture".to_string(),
            DeviceDecision::Skip(reason) => format!("skip: {}", reason),
        };
        println!(
            "[{}] {} ({}) {} <{}> - {}",
            id, device.name, device.description, device.kind, device.flags, decision
        );
    }

    Ok(())
}

/// Route panics on the capture worker to the log; the worker already
/// catches and counts them.
fn quiet_worker_panics() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if thread::current().name() == Some(WORKER_THREAD_NAME) {
            tracing::trace!("Capture worker panic: {}", info);
        } else {
            default_hook(info);
        }
    }));
}

fn capture(config: CaptureConfig, verbose: bool) -> Result<()> {
    quiet_worker_panics();

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to install Ctrl+C handler")?;

    let receiver = Arc::new(ConsoleReceiver::new().with_verbose(verbose));
    let mut provider = LivePacketProvider::new(backend(), receiver, config);
    provider.start().context("failed to start capture")?;

    println!("Listening for Photon traffic. Press Ctrl+C to stop.\n");

    loop {
        match rx.recv_timeout(LIVENESS_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if !provider.is_running() {
                    tracing::error!("Capture stopped unexpectedly");
                    break;
                }
            }
        }
    }

    provider.stop();
    println!("\n{}", provider.stats());
    Ok(())
}
