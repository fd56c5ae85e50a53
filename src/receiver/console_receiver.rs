//! Console-based payload receiver.

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::receiver::PayloadReceiver;

/// Number of bytes shown when not in verbose mode
const PREVIEW_LEN: usize = 16;

/// Prints each payload to stdout as a hex dump.
pub struct ConsoleReceiver {
    /// Whether to dump the whole payload
    verbose: bool,
}

impl ConsoleReceiver {
    /// Create a new console receiver.
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Enable or disable full payload dumps.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn format_payload(&self, payload: &[u8]) -> String {
        let shown = if self.verbose {
            payload
        } else {
            &payload[..payload.len().min(PREVIEW_LEN)]
        };

        let mut output = format!("[PHOTON] {:>5} bytes |", payload.len());
        for byte in shown {
            let _ = write!(output, " {:02x}", byte);
        }
        if shown.len() < payload.len() {
            output.push_str(" ...");
        }

        output
    }
}

impl Default for ConsoleReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadReceiver for ConsoleReceiver {
    fn receive_payload(&self, payload: Vec<u8>) -> anyhow::Result<()> {
        let output = self.format_payload(&payload);
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", output)?;
        Ok(())
    }
}
