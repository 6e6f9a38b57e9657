//! TNC bootloader wire protocol.
//!
//! The protocol is deliberately tiny: every command the host sends is a
//! short fixed byte sequence, and every reply from the device is a single
//! ASCII byte. The tables here are the one place those bytes are defined;
//! the session phases never compare raw byte literals.

use std::fmt;

/// Host-to-device command bytes.
pub mod command {
    /// KISS escape that makes the normal-mode firmware jump into the
    /// resident bootloader.
    pub const ENTER_BOOTLOADER: &[u8] = &[0xC0, 0x0D, 0x37, 0xC0];

    /// KISS command asking the normal-mode firmware to dump all of its
    /// state. Idempotent; used only to provoke the device into draining
    /// its own output queue.
    pub const DUMP_STATE: &[u8] = &[0xC0, 0x0D, 0x34, 0xC0];

    /// Status probe. Normal-mode firmware discards it as line noise; a
    /// resident bootloader answers with [`super::READY`].
    pub const STATUS_PROBE: &[u8] = b"?";

    /// Ask the bootloader for its one-byte version code.
    pub const QUERY_VERSION: &[u8] = b"V";

    /// Make the bootloader boot the application firmware. No reply.
    pub const RESET: &[u8] = b"R";
}

/// Ready signal the bootloader emits when it starts, and its per-record
/// acknowledgement.
pub const READY: u8 = b'K';

/// Number of ready bytes the entry handshake expects.
pub const READY_COUNT: usize = 2;

/// Reply: whole image written and verified.
pub const FLASH_DONE: u8 = b'Z';

/// Reply: flash write failed.
pub const FLASH_FAILED: u8 = b'F';

/// Reply: record checksum did not match.
pub const BAD_CHECKSUM: u8 = b'N';

/// Reply: record contained a non-hex character.
pub const BAD_CHARACTER: u8 = b'X';

/// Classified device response to one transferred record.
///
/// Only [`TransferOutcome::Continue`] lets the transfer advance; every
/// other value ends the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Record accepted; send the next one.
    Continue,
    /// Whole image accepted.
    Success,
    /// Device-side flash failure.
    DeviceFailure,
    /// Record checksum rejected.
    ChecksumInvalid,
    /// Record contained an invalid character.
    InvalidCharacter,
    /// No byte arrived within the response timeout, or the byte was not a
    /// known response code.
    NoResponse,
}

impl TransferOutcome {
    /// Classify one device reply. `None` means the read timed out.
    pub fn classify(reply: Option<u8>) -> Self {
        match reply {
            Some(READY) => Self::Continue,
            Some(FLASH_DONE) => Self::Success,
            Some(FLASH_FAILED) => Self::DeviceFailure,
            Some(BAD_CHECKSUM) => Self::ChecksumInvalid,
            Some(BAD_CHARACTER) => Self::InvalidCharacter,
            _ => Self::NoResponse,
        }
    }

    /// Whether this outcome ends the transfer loop.
    pub fn halts(self) -> bool {
        !matches!(self, Self::Continue)
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Continue => "record accepted",
            Self::Success => "flash successful",
            Self::DeviceFailure => "flash failed, the microcontroller may need replacement",
            Self::ChecksumInvalid => "record checksum invalid, the image file may be corrupt",
            Self::InvalidCharacter => "invalid character in record, the image file may be corrupt",
            Self::NoResponse => {
                "no response from the device, it may need replacement or an ICSP reflash"
            }
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_responses() {
        assert_eq!(TransferOutcome::classify(Some(b'K')), TransferOutcome::Continue);
        assert_eq!(TransferOutcome::classify(Some(b'Z')), TransferOutcome::Success);
        assert_eq!(
            TransferOutcome::classify(Some(b'F')),
            TransferOutcome::DeviceFailure
        );
        assert_eq!(
            TransferOutcome::classify(Some(b'N')),
            TransferOutcome::ChecksumInvalid
        );
        assert_eq!(
            TransferOutcome::classify(Some(b'X')),
            TransferOutcome::InvalidCharacter
        );
    }

    #[test]
    fn test_classify_silence_and_garbage() {
        assert_eq!(TransferOutcome::classify(None), TransferOutcome::NoResponse);
        assert_eq!(
            TransferOutcome::classify(Some(0x00)),
            TransferOutcome::NoResponse
        );
        assert_eq!(
            TransferOutcome::classify(Some(b'k')),
            TransferOutcome::NoResponse
        );
    }

    #[test]
    fn test_only_continue_advances() {
        for reply in 0..=u8::MAX {
            let outcome = TransferOutcome::classify(Some(reply));
            assert_eq!(outcome.halts(), outcome != TransferOutcome::Continue);
        }
    }
}
