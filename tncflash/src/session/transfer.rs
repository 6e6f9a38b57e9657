//! Image transfer engine.
//!
//! Streams firmware records to the bootloader one at a time, classifying
//! every device response and halting on the first non-acknowledgement. The
//! engine never retries a record: the device-side failure modes (corrupt
//! record, bad checksum, device fault) are not resolved by resending.

use std::thread;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::image::RecordSource;
use crate::port::Port;
use crate::protocol::TransferOutcome;
use crate::session::TncFlasher;

impl<P: Port> TncFlasher<P> {
    /// Transmit every record of `image` in file order, one in flight at a
    /// time.
    ///
    /// Returns the number of records the device acknowledged before it
    /// reported success. `progress` is called with the accepted count at
    /// the configured cadence.
    pub fn stream_image<S: RecordSource + ?Sized>(
        &mut self,
        image: &mut S,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64> {
        image.rewind()?;
        info!("starting image transfer");

        let mut accepted: u64 = 0;
        let mut index: u64 = 0;
        loop {
            let Some(record) = image.next_record()? else {
                warn!("image exhausted but the device never reported success");
                return Err(Error::TransferIncomplete { accepted });
            };
            index += 1;

            let payload = record.payload().as_bytes();
            if index == 1 {
                // Accepting the first record triggers a page erase the
                // device cannot service at full serial speed; pace it.
                for &byte in payload {
                    self.port.write_all(&[byte])?;
                    self.port.flush()?;
                    thread::sleep(self.config.first_record_byte_delay);
                }
            } else {
                self.port.send(payload)?;
            }

            let reply = self.port.read_byte_within(self.config.response_timeout)?;
            match TransferOutcome::classify(reply) {
                TransferOutcome::Continue => {
                    accepted += 1;
                    if accepted % self.config.progress_interval == 0 {
                        info!("{accepted} record(s) written");
                        progress(accepted);
                    }
                }
                TransferOutcome::Success => {
                    info!("device reported success, {accepted} record(s) accepted");
                    return Ok(accepted);
                }
                outcome => {
                    warn!("transfer halted on record {index}: {outcome}");
                    return Err(Error::Transfer { outcome, accepted });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::HexImage;
    use crate::port::mock::MockPort;
    use crate::session::SessionConfig;
    use std::io::Cursor;
    use std::time::Duration;

    fn config() -> SessionConfig {
        SessionConfig {
            response_timeout: Duration::from_millis(20),
            first_record_byte_delay: Duration::ZERO,
            progress_interval: 10,
            ..SessionConfig::default()
        }
    }

    fn image(text: &str) -> HexImage<Cursor<Vec<u8>>> {
        HexImage::new(Cursor::new(text.as_bytes().to_vec()))
    }

    fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    #[test]
    fn test_first_record_goes_out_byte_by_byte() {
        let port = MockPort::new(&[Some(b'K'), Some(b'Z')]);
        let mut flasher = TncFlasher::with_config(port, config());
        let mut img = image(":10AA\r\n:10BB\r\n");

        flasher.stream_image(&mut img, &mut |_| {}).unwrap();

        // Five single-byte writes for ":10AA", then ":10BB" in one piece.
        let lens = &flasher.port().write_lens;
        assert_eq!(&lens[..5], &[1, 1, 1, 1, 1]);
        assert_eq!(lens[5], 5);
        assert_eq!(flasher.port().written, b":10AA:10BB");
    }

    #[test]
    fn test_terminators_never_reach_the_wire() {
        let port = MockPort::new(&[Some(b'K'), Some(b'K'), Some(b'Z')]);
        let mut flasher = TncFlasher::with_config(port, config());
        let mut img = image(":10AA\r\n:10BB\n\r:10CC\r\n");

        flasher.stream_image(&mut img, &mut |_| {}).unwrap();
        assert_eq!(flasher.port().written, b":10AA:10BB:10CC");
    }

    #[test]
    fn test_halt_sends_no_further_records() {
        let port = MockPort::new(&[Some(b'K'), Some(b'K'), Some(b'N')]);
        let mut flasher = TncFlasher::with_config(port, config());
        let mut img = image(":10AA\n:10BB\n:10CC\n:10DD\n");

        let err = flasher.stream_image(&mut img, &mut |_| {}).unwrap_err();
        match err {
            Error::Transfer { outcome, accepted } => {
                assert_eq!(outcome, TransferOutcome::ChecksumInvalid);
                assert_eq!(accepted, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(count_occurrences(&flasher.port().written, b":10DD"), 0);
    }

    #[test]
    fn test_unrecognized_reply_is_no_response() {
        let port = MockPort::new(&[Some(0x7F)]);
        let mut flasher = TncFlasher::with_config(port, config());
        let mut img = image(":10AA\n:10BB\n");

        let err = flasher.stream_image(&mut img, &mut |_| {}).unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer {
                outcome: TransferOutcome::NoResponse,
                accepted: 0,
            }
        ));
    }

    #[test]
    fn test_silent_device_is_no_response() {
        let port = MockPort::new(&[Some(b'K')]); // then nothing, ever
        let mut flasher = TncFlasher::with_config(port, config());
        let mut img = image(":10AA\n:10BB\n:10CC\n");

        let err = flasher.stream_image(&mut img, &mut |_| {}).unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer {
                outcome: TransferOutcome::NoResponse,
                accepted: 1,
            }
        ));
    }

    #[test]
    fn test_progress_reports_at_cadence() {
        let mut script: Vec<Option<u8>> = std::iter::repeat_n(Some(b'K'), 24).collect();
        script.push(Some(b'Z'));
        let port = MockPort::new(&script);
        let mut flasher = TncFlasher::with_config(port, config());

        let text: String = (0..25).map(|i| format!(":10{i:04X}00AB\r\n")).collect();
        let mut img = image(&text);

        let mut reports = Vec::new();
        flasher
            .stream_image(&mut img, &mut |accepted| reports.push(accepted))
            .unwrap();
        assert_eq!(reports, vec![10, 20]);
    }
}
