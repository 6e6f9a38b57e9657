//! # tncflash
//!
//! A library for reflashing the firmware of a serial-attached TNC through
//! its resident bootloader.
//!
//! The core of the crate is the bootloader handshake and transfer state
//! machine:
//!
//! - identifying which hardware revision a firmware image targets
//!   ([`resolve_image_target`])
//! - quieting a serial channel that may hold stale data from a prior
//!   session ([`TncFlasher::drain_channel`])
//! - moving the device into bootloader mode, or detecting that an aborted
//!   run already left it there, and confirming bootloader/hardware
//!   compatibility ([`TncFlasher::negotiate`])
//! - streaming the image one record at a time with per-record
//!   acknowledgement and failure classification
//!   ([`TncFlasher::stream_image`])
//!
//! Everything talks to the device through the [`Port`] trait, so the whole
//! protocol can run against an in-memory transport in tests. Every wait has
//! a numeric budget in [`SessionConfig`]; no read blocks indefinitely.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tncflash::{HexImage, NativePort, SerialConfig, TncFlasher};
//!
//! fn main() -> tncflash::Result<()> {
//!     let mut image = HexImage::open("firmware.hex")?;
//!     let port = NativePort::open(&SerialConfig::new("/dev/ttyUSB0", 57_600))?;
//!
//!     let mut flasher = TncFlasher::new(port);
//!     let result = flasher.update(&mut image, &mut |records| {
//!         println!("{records} records written");
//!     })?;
//!     println!("{result:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod image;
pub mod port;
pub mod protocol;
pub mod session;
pub mod target;

// Re-exports for convenience
pub use {
    error::{Error, Result},
    image::{FirmwareRecord, HexImage, RecordSource},
    port::{NativePort, Port, PortInfo, SerialConfig, available_ports},
    protocol::TransferOutcome,
    session::{LinkState, SessionConfig, SessionResult, TncFlasher},
    target::{HardwareRevision, VersionReport, decode_version, resolve_image_target},
};
