//! Hardware revision identification.
//!
//! The hardware revision is learned twice, independently: once from the
//! firmware image (a signature record planted in the bootloader's reserved
//! flash page) and once from the device (the bootloader's version code).
//! Both lookups are plain tables, so supporting a new board revision is a
//! data change here and nowhere else.

use std::fmt;

use log::{debug, trace};

use crate::error::Result;
use crate::image::RecordSource;

/// Board revision of the device, as targeted by an image or reported by a
/// bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareRevision {
    /// Rev A boards.
    RevA,
    /// Rev B boards.
    RevB,
    /// No known signature matched.
    Unknown,
}

impl fmt::Display for HardwareRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RevA => write!(f, "Rev A"),
            Self::RevB => write!(f, "Rev B"),
            Self::Unknown => write!(f, "unknown hardware"),
        }
    }
}

/// Signature records planted in the bootloader's reserved page (0xFB00) of
/// every shipped image. Each revision has two build variants.
pub const IMAGE_SIGNATURES: &[(&str, HardwareRevision)] = &[
    (":04FB00004E39413306", HardwareRevision::RevA),
    (":04FBF0004E39413316", HardwareRevision::RevA),
    (":04FB00004E39413405", HardwareRevision::RevB),
    (":04FBF0004E39413415", HardwareRevision::RevB),
];

/// Bootloader version codes, as reported in reply to the version query.
/// Several codes map to the same revision; that is expected across
/// bootloader releases.
pub const VERSION_CODES: &[(u8, HardwareRevision)] = &[
    (b'a', HardwareRevision::RevA),
    (b'b', HardwareRevision::RevA),
    (b'c', HardwareRevision::RevA),
    (b'd', HardwareRevision::RevB),
    (b'e', HardwareRevision::RevB),
];

/// Result of decoding a version-query reply byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionReport {
    /// A supported bootloader; the device's hardware revision.
    Supported(HardwareRevision),
    /// A well-formed version character this tool does not support.
    Incompatible(char),
    /// Not a version character at all.
    Invalid(u8),
}

/// Decode the byte the bootloader sent in reply to the version query.
///
/// Total over all byte values: every reply classifies as supported,
/// incompatible or invalid.
pub fn decode_version(byte: u8) -> VersionReport {
    if let Some(&(_, revision)) = VERSION_CODES.iter().find(|&&(code, _)| code == byte) {
        return VersionReport::Supported(revision);
    }
    if byte.is_ascii_lowercase() {
        VersionReport::Incompatible(byte as char)
    } else {
        VersionReport::Invalid(byte)
    }
}

/// Scan a firmware image for a known hardware signature.
///
/// Records are compared in file order and scanning stops at the first
/// match; an image with no matching record resolves to
/// [`HardwareRevision::Unknown`]. The source is rewound before and after
/// the scan, so the caller can re-read every record from the start.
pub fn resolve_image_target<S: RecordSource + ?Sized>(image: &mut S) -> Result<HardwareRevision> {
    image.rewind()?;

    let mut scanned: u64 = 0;
    let revision = loop {
        match image.next_record()? {
            Some(record) => {
                scanned += 1;
                let line = record.trimmed();
                if let Some(&(_, revision)) = IMAGE_SIGNATURES
                    .iter()
                    .find(|&&(signature, _)| signature == line)
                {
                    trace!("signature match on record {scanned}: {line}");
                    break revision;
                }
            }
            None => break HardwareRevision::Unknown,
        }
    };

    image.rewind()?;
    debug!("image scan: {revision} after {scanned} record(s)");
    Ok(revision)
}
