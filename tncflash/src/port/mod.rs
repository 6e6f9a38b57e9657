//! Serial port abstraction.
//!
//! The whole handshake and transfer core talks to the device through the
//! [`Port`] trait rather than a concrete serial implementation. The trait
//! exposes exactly the primitives the protocol needs: a timeout-bounded
//! single-byte read, write, input/output discard, the buffered byte count,
//! and a reconnect used by the bootloader-entry retry policy.
//!
//! Every wait in the protocol goes through [`Port::read_byte_within`], so
//! "no data yet" is always an explicit `Ok(None)` instead of an ad hoc
//! busy-wait somewhere in a phase.

pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{self, Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Serial port configuration.
///
/// The TNC link always runs 8 data bits, no parity, one stop bit, no flow
/// control; only the device path, bit rate and read timeout vary.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Default read timeout.
    pub timeout: Duration,
}

/// Bit rate the TNC's serial link is fixed at.
pub const DEFAULT_BAUD: u32 = 57_600;

/// Default per-read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port information, as reported by the OS.
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
}

/// Byte-oriented transport to the device.
pub trait Port: Read + Write + Send {
    /// Set the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Get the current read timeout.
    fn timeout(&self) -> Duration;

    /// Get the configured baud rate.
    fn baud_rate(&self) -> u32;

    /// Number of bytes already buffered on the receive side.
    fn bytes_to_read(&mut self) -> Result<u32>;

    /// Discard everything buffered on the receive side.
    fn discard_input(&mut self) -> Result<()>;

    /// Discard everything queued on the transmit side.
    fn discard_output(&mut self) -> Result<()>;

    /// Close and reopen the link with the same parameters.
    fn reconnect(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Write all bytes and flush them out.
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_all(bytes)?;
        self.flush()?;
        Ok(())
    }

    /// Read one byte, waiting at most `wait`.
    ///
    /// Returns `Ok(None)` when the wait elapses with nothing buffered; an
    /// `Err` is a real transport failure, never a timeout.
    fn read_byte_within(&mut self, wait: Duration) -> Result<Option<u8>> {
        let previous = self.timeout();
        self.set_timeout(wait)?;
        let mut buf = [0u8; 1];
        let outcome = match self.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        };
        self.set_timeout(previous)?;
        outcome
    }
}

// Re-export the native implementation
pub use native::{NativePort, available_ports};
