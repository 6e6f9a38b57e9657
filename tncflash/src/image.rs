//! Firmware image source.
//!
//! A firmware image is an ordered sequence of text records (one hex record
//! per line). The transfer unit is the line, so this module stays purely
//! line-oriented: it never decodes record payloads, it only normalizes line
//! terminators for the wire.
//!
//! The [`RecordSource`] trait is rewindable on purpose: the chip target
//! resolver makes a full pass over the image before the transfer starts,
//! and the transfer engine then re-reads every record from the beginning.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;

/// One line of the firmware image, as read from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareRecord {
    raw: String,
}

impl FirmwareRecord {
    /// Wrap a raw image line, terminator included.
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The line exactly as it appeared in the image.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The bytes to put on the wire.
    ///
    /// A trailing two-character terminator (`\r\n` or `\n\r`) is stripped
    /// exactly once; a line ending in a single terminator character is sent
    /// unchanged.
    pub fn payload(&self) -> &str {
        if self.raw.ends_with("\r\n") || self.raw.ends_with("\n\r") {
            &self.raw[..self.raw.len() - 2]
        } else {
            &self.raw
        }
    }

    /// The record with all trailing terminator characters removed, for
    /// signature comparison.
    pub fn trimmed(&self) -> &str {
        self.raw.trim_end_matches(['\r', '\n'])
    }
}

/// Rewindable, ordered sequence of firmware records.
pub trait RecordSource {
    /// Read the next record, or `None` at end of input.
    fn next_record(&mut self) -> Result<Option<FirmwareRecord>>;

    /// Reposition the source at the first record.
    fn rewind(&mut self) -> Result<()>;
}

/// Firmware image backed by any seekable line reader.
pub struct HexImage<R: BufRead + Seek> {
    reader: R,
}

impl HexImage<BufReader<File>> {
    /// Open a firmware image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead + Seek> HexImage<R> {
    /// Wrap an already-open reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Count the records in the image, leaving it rewound.
    pub fn record_count(&mut self) -> Result<u64> {
        self.rewind()?;
        let mut count = 0;
        while self.next_record()?.is_some() {
            count += 1;
        }
        self.rewind()?;
        Ok(count)
    }
}

impl<R: BufRead + Seek> RecordSource for HexImage<R> {
    fn next_record(&mut self) -> Result<Option<FirmwareRecord>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(FirmwareRecord::new(line)))
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}
