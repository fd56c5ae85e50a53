use std::path::Path;
use std::time::Duration;

use crate::capture::{CaptureOptions, DEFAULT_SNAPLEN};
use crate::error::ConfigError;
use crate::filter::PHOTON_PORT;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/photon-capture.conf";
const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_IDLE_BACKOFF_MS: u64 = 25;
const DEFAULT_LOG_FILTER: &str = "info";

/// Capture session configuration.
///
/// Read once when a session starts; changes take effect on the next start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Capture only on this device id (`None` = every suitable device)
    pub network_device: Option<usize>,
    /// Backend filter expression, e.g. a BPF string for libpcap
    pub packet_filter: Option<String>,
    /// Always `PHOTON_PORT`; not settable from files or the environment
    port: u16,
    /// Maximum frames per device per dispatch call
    pub batch_size: usize,
    /// Pause after a dispatch call that found nothing
    pub idle_backoff: Duration,
    pub snaplen: usize,
    pub promiscuous: bool,
    /// Default tracing filter when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            network_device: None,
            packet_filter: None,
            port: PHOTON_PORT,
            batch_size: DEFAULT_BATCH_SIZE,
            idle_backoff: Duration::from_millis(DEFAULT_IDLE_BACKOFF_MS),
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: true,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl CaptureConfig {
    /// Load configuration from `path` (if it exists), then apply
    /// `PHOTON_CAPTURE_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::default();

        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            config.apply_str(&content)?;
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `key = value` lines. Blank lines and `#` comments are skipped,
    /// unknown keys are ignored.
    pub fn apply_str(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                self.set(key.trim(), value.trim())?;
            }
        }
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        const KEYS: [&str; 7] = [
            "network_device",
            "packet_filter",
            "batch_size",
            "idle_backoff_ms",
            "snaplen",
            "promiscuous",
            "log_filter",
        ];

        for key in KEYS {
            let var = format!("PHOTON_CAPTURE_{}", key.to_uppercase());
            if let Some(value) = lookup(&var) {
                self.set(key, value.trim())?;
            }
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "network_device" => {
                self.network_device = match value {
                    "" | "all" => None,
                    id => Some(id.parse().map_err(|_| invalid())?),
                };
            }
            "packet_filter" => {
                self.packet_filter = (!value.is_empty()).then(|| value.to_string());
            }
            "batch_size" => {
                self.batch_size = value.parse().map_err(|_| invalid())?;
                if self.batch_size == 0 {
                    return Err(invalid());
                }
            }
            "idle_backoff_ms" => {
                self.idle_backoff = Duration::from_millis(value.parse().map_err(|_| invalid())?);
            }
            "snaplen" => self.snaplen = value.parse().map_err(|_| invalid())?,
            "promiscuous" => self.promiscuous = value.parse().map_err(|_| invalid())?,
            "log_filter" => self.log_filter = value.to_string(),
            _ => {}
        }
        Ok(())
    }

    /// Port the session filters on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            snaplen: self.snaplen,
            promiscuous: self.promiscuous,
        }
    }
}
