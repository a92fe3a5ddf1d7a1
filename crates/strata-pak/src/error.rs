//! Error types for the pak crate.

use thiserror::Error;

/// Errors that can occur when working with pak archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] strata_common::Error),

    /// Could not find the end of central directory record.
    #[error("could not find end of central directory record")]
    EocdNotFound,

    /// The central directory declares no entries.
    #[error("archive has no entries")]
    EmptyArchive,

    /// Split or spanned archives are not supported.
    #[error("multi-volume archive (disk {disk}, central directory on disk {central_dir_disk})")]
    MultiVolume { disk: u16, central_dir_disk: u16 },

    /// ZIP64 archives are not supported.
    #[error("ZIP64 archives are not supported")]
    Zip64Unsupported,

    /// The end of central directory record points outside the file.
    #[error("inconsistent end of central directory: {0}")]
    InconsistentDirectory(&'static str),

    /// Invalid ZIP magic bytes.
    #[error(
        "invalid ZIP signature at offset {offset}: expected {expected:#010x}, got {actual:#010x}"
    )]
    InvalidSignature {
        expected: u32,
        actual: u32,
        offset: u64,
    },

    /// Unsupported compression method.
    #[error("unsupported compression method {method} for {name}")]
    UnsupportedCompression { name: String, method: u16 },

    /// Encrypted entries are not supported.
    #[error("encrypted entry: {0}")]
    Encrypted(String),

    /// Local header disagrees with the central directory.
    #[error("corrupt entry {name}: {reason}")]
    CorruptEntry { name: String, reason: &'static str },

    /// Checksum of the delivered bytes differs from the central directory.
    #[error("CRC mismatch in {name}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Entry not found.
    #[error("entry not found: {0}")]
    EntryNotFound(String),
}

impl Error {
    /// True when the whole archive must be rejected.
    pub fn is_bad_archive(&self) -> bool {
        matches!(
            self,
            Error::EocdNotFound
                | Error::EmptyArchive
                | Error::MultiVolume { .. }
                | Error::Zip64Unsupported
                | Error::InconsistentDirectory(_)
                | Error::InvalidSignature { .. }
                | Error::UnsupportedCompression { .. }
                | Error::Encrypted(_)
                | Error::Common(_)
        )
    }

    /// True when a single entry's headers disagree.
    pub fn is_corrupt_entry(&self) -> bool {
        matches!(self, Error::CorruptEntry { .. })
    }
}

/// Result type for pak operations.
pub type Result<T> = std::result::Result<T, Error>;
