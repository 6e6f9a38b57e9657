//! Bootloader session negotiator.
//!
//! Transitions the device from normal operation into bootloader mode (or
//! detects that it is already stranded there), then confirms that the
//! bootloader is compatible with the firmware image before a single record
//! goes out.

use std::thread;
use std::time::Instant;

use log::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::{READY, READY_COUNT, command};
use crate::session::{LinkState, TncFlasher};
use crate::target::{self, HardwareRevision, VersionReport};

impl<P: Port> TncFlasher<P> {
    /// Bring the bootloader up and verify it matches `image_revision`.
    ///
    /// Returns the device's hardware revision; on success the link state is
    /// [`LinkState::Active`]. On a version or revision failure a reset is
    /// attempted on a best-effort basis so the device is not left stranded.
    pub fn negotiate(&mut self, image_revision: HardwareRevision) -> Result<HardwareRevision> {
        if self.probe_stranded()? {
            info!("device is already in bootloader mode (stranded session)");
            self.state = LinkState::Stranded;
        } else {
            self.enter_bootloader()?;
        }
        self.state = LinkState::Active;

        let reply = self.read_version_byte()?;
        match target::decode_version(reply) {
            VersionReport::Supported(device) if device == image_revision => {
                info!(
                    "bootloader version '{}' ({device}) matches the image",
                    reply as char
                );
                Ok(device)
            }
            VersionReport::Supported(device) => {
                warn!("image targets {image_revision} but the device is {device}");
                self.reset_device();
                self.state = LinkState::Failed;
                Err(Error::RevisionMismatch {
                    image: image_revision,
                    device,
                })
            }
            VersionReport::Incompatible(code) => {
                warn!("bootloader version '{code}' is not supported by this tool");
                self.reset_device();
                self.state = LinkState::Failed;
                Err(Error::IncompatibleBootloader { code })
            }
            VersionReport::Invalid(byte) => {
                warn!("version query answered with {byte:#04x}, not a version code");
                self.reset_device();
                self.state = LinkState::Failed;
                Err(Error::InvalidVersion { byte })
            }
        }
    }

    /// Check whether a prior aborted run left the device in bootloader
    /// mode. Normal-mode firmware ignores the probe; a resident bootloader
    /// answers with the ready signal.
    fn probe_stranded(&mut self) -> Result<bool> {
        self.port.send(command::STATUS_PROBE)?;
        match self.port.read_byte_within(self.config.probe_wait)? {
            Some(READY) => Ok(true),
            Some(byte) => {
                trace!("probe answered with {byte:#04x}; not a bootloader");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Send the entry escape and wait for the bootloader's ready signal,
    /// reopening and re-draining the link between failed attempts.
    fn enter_bootloader(&mut self) -> Result<()> {
        self.state = LinkState::Entering;
        let attempts = self.config.entry_attempts;

        for attempt in 1..=attempts {
            if attempt > 1 {
                warn!("no ready signal, reopening the link (attempt {attempt}/{attempts})");
                self.port.reconnect()?;
                self.drain_channel()?;
            }
            debug!("requesting bootloader entry");
            self.port.send(command::ENTER_BOOTLOADER)?;
            if self.await_ready()? {
                info!("device entered bootloader mode");
                return Ok(());
            }
        }

        self.state = LinkState::Failed;
        self.reset_device();
        Err(Error::BootloaderNotDetected { attempts })
    }

    /// Wait for the entry handshake's ready bytes within the configured
    /// timeout. Any other byte means the handshake is not happening.
    fn await_ready(&mut self) -> Result<bool> {
        let started = Instant::now();
        let mut seen = 0;
        while seen < READY_COUNT {
            let Some(remaining) = self
                .config
                .entry_ready_timeout
                .checked_sub(started.elapsed())
            else {
                return Ok(false);
            };
            match self.port.read_byte_within(remaining)? {
                Some(READY) => seen += 1,
                Some(byte) => {
                    debug!("expected ready signal, got {byte:#04x}");
                    return Ok(false);
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Query the bootloader version, skipping stale ready signals the
    /// device may still be emitting from the entry handshake.
    fn read_version_byte(&mut self) -> Result<u8> {
        self.port.send(command::QUERY_VERSION)?;
        let started = Instant::now();
        loop {
            let Some(remaining) = self
                .config
                .version_settle_timeout
                .checked_sub(started.elapsed())
            else {
                self.state = LinkState::Failed;
                return Err(Error::LinkUnstable);
            };
            let wait = remaining.min(self.config.response_timeout);
            match self.port.read_byte_within(wait)? {
                Some(READY) => trace!("skipping stale ready signal"),
                Some(byte) => return Ok(byte),
                None => {
                    self.state = LinkState::Failed;
                    return Err(Error::LinkUnstable);
                }
            }
        }
    }

    /// Best-effort return to operating mode. Failure here must not mask
    /// the error that brought us down.
    fn reset_device(&mut self) {
        debug!("attempting to return the device to operating mode");
        if let Err(e) = self.port.send(command::RESET) {
            debug!("reset command not delivered: {e}");
        }
        thread::sleep(self.config.reset_settle);
        if let Err(e) = self.port.discard_input() {
            debug!("post-reset input discard failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;
    use crate::session::SessionConfig;
    use std::time::Duration;

    fn config() -> SessionConfig {
        SessionConfig {
            response_timeout: Duration::from_millis(20),
            drain_budget: Duration::from_millis(40),
            drain_read_wait: Duration::from_millis(1),
            drain_provoke_after: Duration::from_millis(30),
            probe_wait: Duration::from_millis(5),
            entry_attempts: 3,
            entry_ready_timeout: Duration::from_millis(20),
            version_settle_timeout: Duration::from_millis(20),
            reset_settle: Duration::ZERO,
            ..SessionConfig::default()
        }
    }

    fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    #[test]
    fn test_stranded_device_skips_entry() {
        let port = MockPort::new(&[Some(b'K'), Some(b'a')]);
        let mut flasher = TncFlasher::with_config(port, config());

        let device = flasher.negotiate(HardwareRevision::RevA).unwrap();
        assert_eq!(device, HardwareRevision::RevA);
        assert_eq!(flasher.link_state(), LinkState::Active);

        let written = &flasher.port().written;
        assert_eq!(count_occurrences(written, command::ENTER_BOOTLOADER), 0);
        assert_eq!(count_occurrences(written, command::STATUS_PROBE), 1);
    }

    #[test]
    fn test_entry_succeeds_on_second_attempt() {
        let script = [
            None,       // probe unanswered
            None,       // attempt 1: no ready signal
            None,       // re-drain after reconnect: quiet
            Some(b'K'), // attempt 2: ready
            Some(b'K'),
            Some(b'a'), // version
        ];
        let port = MockPort::new(&script);
        let mut flasher = TncFlasher::with_config(port, config());

        let device = flasher.negotiate(HardwareRevision::RevA).unwrap();
        assert_eq!(device, HardwareRevision::RevA);
        assert_eq!(flasher.port().reconnects, 1);
        assert_eq!(
            count_occurrences(&flasher.port().written, command::ENTER_BOOTLOADER),
            2
        );
    }

    #[test]
    fn test_garbage_during_entry_fails_that_attempt() {
        let script = [
            None,       // probe unanswered
            Some(0xC0), // attempt 1: garbage instead of ready
            None,       // re-drain
            Some(b'K'), // attempt 2
            Some(b'K'),
            Some(b'a'),
        ];
        let port = MockPort::new(&script);
        let mut flasher = TncFlasher::with_config(port, config());

        flasher.negotiate(HardwareRevision::RevA).unwrap();
        assert_eq!(flasher.port().reconnects, 1);
    }

    #[test]
    fn test_incompatible_version_resets_device() {
        let port = MockPort::new(&[Some(b'K'), Some(b'z')]);
        let mut flasher = TncFlasher::with_config(port, config());

        let err = flasher.negotiate(HardwareRevision::RevA).unwrap_err();
        assert!(matches!(err, Error::IncompatibleBootloader { code: 'z' }));
        assert_eq!(flasher.link_state(), LinkState::Failed);
        assert!(flasher.port().written.ends_with(command::RESET));
    }

    #[test]
    fn test_invalid_version_byte_resets_device() {
        let port = MockPort::new(&[Some(b'K'), Some(0x21)]);
        let mut flasher = TncFlasher::with_config(port, config());

        let err = flasher.negotiate(HardwareRevision::RevA).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { byte: 0x21 }));
        assert!(flasher.port().written.ends_with(command::RESET));
    }

    #[test]
    fn test_version_read_skips_stale_ready_signals() {
        let script = [
            Some(b'K'), // probe: stranded
            Some(b'K'), // stale ready signals still draining out
            Some(b'K'),
            Some(b'b'), // the actual version byte
        ];
        let port = MockPort::new(&script);
        let mut flasher = TncFlasher::with_config(port, config());

        let device = flasher.negotiate(HardwareRevision::RevA).unwrap();
        assert_eq!(device, HardwareRevision::RevA);
    }

    #[test]
    fn test_version_read_gives_up_when_link_never_stabilizes() {
        let script = [
            Some(b'K'), // probe: stranded
            Some(b'K'),
            Some(b'K'),
            Some(b'K'),
            None, // then silence
        ];
        let port = MockPort::new(&script);
        let mut flasher = TncFlasher::with_config(port, config());

        let err = flasher.negotiate(HardwareRevision::RevA).unwrap_err();
        assert!(matches!(err, Error::LinkUnstable));
        assert_eq!(flasher.link_state(), LinkState::Failed);
    }
}
