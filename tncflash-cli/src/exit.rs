//! Process exit status contract.
//!
//! Every terminal condition of a flashing run maps to a distinct numeric
//! code; these codes are the machine-readable contract with callers and
//! must stay stable. Status 2 is owned by clap (usage/argument errors) and
//! has no constant here.

use tncflash::{Error, HardwareRevision, SessionResult};

/// Firmware was updated.
pub const UPDATED: u8 = 0;
/// Firmware not updated: already current.
pub const ALREADY_CURRENT: u8 = 1;
/// Firmware not updated: could not open the serial port.
pub const PORT_UNAVAILABLE: u8 = 3;
/// Firmware not updated: could not open the image file.
pub const IMAGE_UNREADABLE: u8 = 4;
/// Firmware not updated: invalid version byte received from the device.
pub const INVALID_VERSION: u8 = 5;
/// Firmware not updated: bootloader not detected.
pub const NO_BOOTLOADER: u8 = 6;
/// Firmware not updated: incompatible bootloader version.
pub const INCOMPATIBLE_BOOTLOADER: u8 = 7;
/// Firmware not updated: transfer failed.
pub const TRANSFER_FAILED: u8 = 8;
/// Firmware not updated: image matches no known hardware signature.
pub const UNKNOWN_IMAGE_TARGET: u8 = 9;
/// Firmware not updated: image targets Rev A but the device is not.
pub const MISMATCH_IMAGE_REV_A: u8 = 10;
/// Firmware not updated: image targets Rev B but the device is not.
pub const MISMATCH_IMAGE_REV_B: u8 = 11;
/// Firmware not updated: serial channel could not be quieted.
pub const CHANNEL_BUSY: u8 = 12;

/// Exit status for a completed session.
pub fn for_result(result: SessionResult) -> u8 {
    match result {
        SessionResult::Updated { .. } => UPDATED,
        SessionResult::AlreadyCurrent => ALREADY_CURRENT,
    }
}

/// Exit status for a failed session.
///
/// Transport-level failures (I/O, serial) report the transport code: once
/// the port stops answering there is no more specific story to tell.
pub fn for_error(err: &Error) -> u8 {
    match err {
        Error::Io(_) | Error::Serial(_) => PORT_UNAVAILABLE,
        Error::ChannelBusy { .. } => CHANNEL_BUSY,
        Error::BootloaderNotDetected { .. } | Error::LinkUnstable => NO_BOOTLOADER,
        Error::InvalidVersion { .. } => INVALID_VERSION,
        Error::IncompatibleBootloader { .. } => INCOMPATIBLE_BOOTLOADER,
        Error::UnknownImageTarget => UNKNOWN_IMAGE_TARGET,
        Error::RevisionMismatch { image, .. } => match image {
            HardwareRevision::RevA => MISMATCH_IMAGE_REV_A,
            HardwareRevision::RevB => MISMATCH_IMAGE_REV_B,
            // The mismatch check only runs on recognized images.
            HardwareRevision::Unknown => UNKNOWN_IMAGE_TARGET,
        },
        Error::Transfer { .. } | Error::TransferIncomplete { .. } => TRANSFER_FAILED,
    }
}
