//! Flashing session: state machine, budgets, and the phase orchestrator.
//!
//! A session runs strictly forward through four phases: resolve the image's
//! hardware target, quiet the serial channel, negotiate the bootloader
//! session, stream the image. Failure in any phase aborts the whole
//! operation with a distinct [`Error`](crate::Error) variant.

mod negotiate;
mod sync;
mod transfer;

use std::fmt;
use std::time::Duration;

use log::info;

use crate::error::{Error, Result};
use crate::image::RecordSource;
use crate::port::Port;
use crate::target::{self, HardwareRevision};

/// Where the device session currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Normal runtime (KISS) mode.
    Operating,
    /// Already in bootloader mode, left over from an earlier aborted run.
    Stranded,
    /// Bootloader entry handshake in progress.
    Entering,
    /// Bootloader mode confirmed; ready for transfer.
    Active,
    /// The handshake could not be completed.
    Failed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Operating => "operating",
            Self::Stranded => "stranded in bootloader",
            Self::Entering => "entering bootloader",
            Self::Active => "bootloader active",
            Self::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Final verdict of a completed session.
///
/// Failed sessions are the `Err` side of [`Result`]; each abort reason is
/// its own [`Error`](crate::Error) variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionResult {
    /// The image was streamed and the device reported success.
    Updated {
        /// Records the device acknowledged before reporting success.
        records: u64,
    },
    /// The installed firmware already matches the image.
    ///
    /// Part of the stable exit contract; no phase currently produces it
    /// because the resident bootloader cannot report the installed
    /// firmware version.
    AlreadyCurrent,
}

/// Every timing and retry budget of a session, in one place.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wait for the device's reply to one transferred record.
    pub response_timeout: Duration,
    /// Wall-clock budget for quieting the serial channel.
    pub drain_budget: Duration,
    /// Per-read wait during the passive flush; a read that returns nothing
    /// within this wait means the channel is quiet.
    pub drain_read_wait: Duration,
    /// If the channel is still noisy after this much of the budget, send
    /// the dump-all-state command once to provoke a device-side flush.
    pub drain_provoke_after: Duration,
    /// Wait for the stranded-bootloader probe reply.
    pub probe_wait: Duration,
    /// Bootloader entry attempts before giving up.
    pub entry_attempts: usize,
    /// Wait for the bootloader's ready signal after one entry attempt.
    pub entry_ready_timeout: Duration,
    /// Budget for the version read to get past stale ready signals.
    pub version_settle_timeout: Duration,
    /// Pause after sending the reset command, giving the device time to
    /// reboot into the application firmware.
    pub reset_settle: Duration,
    /// Pause between bytes of the first record; the page erase it triggers
    /// cannot be serviced at full serial speed.
    pub first_record_byte_delay: Duration,
    /// Report progress every this many accepted records.
    pub progress_interval: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(3),
            drain_budget: Duration::from_secs(12),
            drain_read_wait: Duration::from_millis(500),
            drain_provoke_after: Duration::from_secs(4),
            probe_wait: Duration::from_millis(500),
            entry_attempts: 3,
            entry_ready_timeout: Duration::from_secs(3),
            version_settle_timeout: Duration::from_secs(2),
            reset_settle: Duration::from_secs(1),
            first_record_byte_delay: Duration::from_millis(100),
            progress_interval: 1000,
        }
    }
}

impl SessionConfig {
    /// Set the per-record response timeout.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the channel-drain wall-clock budget.
    #[must_use]
    pub fn with_drain_budget(mut self, budget: Duration) -> Self {
        self.drain_budget = budget;
        self
    }

    /// Set the number of bootloader entry attempts.
    #[must_use]
    pub fn with_entry_attempts(mut self, attempts: usize) -> Self {
        self.entry_attempts = attempts;
        self
    }
}

/// Drives the resident bootloader of a TNC over a serial link.
///
/// Generic over the port type so the protocol can be exercised against an
/// in-memory port in tests.
pub struct TncFlasher<P: Port> {
    port: P,
    config: SessionConfig,
    state: LinkState,
}

impl<P: Port> TncFlasher<P> {
    /// Create a flasher over an opened port with default budgets.
    pub fn new(port: P) -> Self {
        Self::with_config(port, SessionConfig::default())
    }

    /// Create a flasher with custom budgets.
    pub fn with_config(port: P, config: SessionConfig) -> Self {
        Self {
            port,
            config,
            state: LinkState::Operating,
        }
    }

    /// The session's timing and retry budgets.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Where the device session currently sits.
    pub fn link_state(&self) -> LinkState {
        self.state
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the flasher and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Run a complete update session against `image`.
    ///
    /// `progress` is called with the accepted-record count at the cadence
    /// configured by [`SessionConfig::progress_interval`].
    pub fn update<S: RecordSource + ?Sized>(
        &mut self,
        image: &mut S,
        progress: &mut dyn FnMut(u64),
    ) -> Result<SessionResult> {
        let image_revision = target::resolve_image_target(image)?;
        if image_revision == HardwareRevision::Unknown {
            return Err(Error::UnknownImageTarget);
        }
        info!("firmware image targets {image_revision}");

        self.drain_channel()?;

        let device_revision = self.negotiate(image_revision)?;
        info!("device is {device_revision}, bootloader ready for transfer");

        let records = self.stream_image(image, progress)?;
        Ok(SessionResult::Updated { records })
    }
}
