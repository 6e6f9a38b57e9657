//! Error types for tncflash.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::TransferOutcome;
use crate::target::HardwareRevision;

/// Result type for tncflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for tncflash operations.
///
/// Every terminal condition of a flashing session maps to exactly one
/// variant, so callers can report distinct outcomes without string matching.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, image file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The serial channel kept producing data and could not be quieted.
    #[error(
        "serial channel could not be quieted after {waited:.1?}; \
         another process or device may be transmitting on the port"
    )]
    ChannelBusy {
        /// How long the synchronizer waited before giving up.
        waited: Duration,
    },

    /// The bootloader never signalled ready within the retry budget.
    #[error("bootloader not detected after {attempts} entry attempt(s)")]
    BootloaderNotDetected {
        /// Number of entry attempts made.
        attempts: usize,
    },

    /// The link kept emitting stale ready signals and never produced a
    /// version byte.
    #[error("link never stabilized; no version byte received from the bootloader")]
    LinkUnstable,

    /// The device replied to the version query with a byte that is not a
    /// version character at all.
    #[error("device reported an invalid bootloader version byte ({byte:#04x})")]
    InvalidVersion {
        /// The raw reply byte.
        byte: u8,
    },

    /// The device reported a well-formed version code that this tool does
    /// not support.
    #[error("incompatible bootloader version '{code}'")]
    IncompatibleBootloader {
        /// The version character reported by the device.
        code: char,
    },

    /// The firmware image matched no known hardware signature.
    #[error("firmware image matches no known hardware signature")]
    UnknownImageTarget,

    /// The image targets a different hardware revision than the device.
    #[error("firmware image targets {image} but the device is {device}")]
    RevisionMismatch {
        /// Revision the image was built for.
        image: HardwareRevision,
        /// Revision the device reported.
        device: HardwareRevision,
    },

    /// The device rejected a record during transfer.
    #[error("transfer failed after {accepted} accepted record(s): {outcome}")]
    Transfer {
        /// The classified device response that ended the transfer.
        outcome: TransferOutcome,
        /// Records the device had acknowledged before the failure.
        accepted: u64,
    },

    /// The image ran out of records but the device never reported success.
    #[error(
        "image exhausted after {accepted} accepted record(s) \
         but the device never reported success"
    )]
    TransferIncomplete {
        /// Records the device had acknowledged.
        accepted: u64,
    },
}
