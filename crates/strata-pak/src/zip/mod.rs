//! ZIP format structures.
//!
//! This module contains the low-level record layouts for parsing zip
//! archives. Only single-volume, non-ZIP64, unencrypted archives are accepted.

pub mod central_dir;
mod eocd;
mod local;

pub use central_dir::CentralDirectoryHeader;
pub use eocd::EocdRecord;
pub use local::LocalFileHeader;

/// General purpose bit flags.
pub mod flags {
    /// Entry is encrypted.
    pub const ENCRYPTED: u16 = 1 << 0;
    /// CRC and sizes are zero in the local header and follow the data.
    pub const DATA_DESCRIPTOR: u16 = 1 << 3;
    /// File name and comment are UTF-8.
    pub const UTF8: u16 = 1 << 11;
}

/// Compression methods accepted in pak archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CompressionMethod {
    /// No compression (stored).
    Store = 0,
    /// Raw DEFLATE compression.
    Deflate = 8,
}

impl TryFrom<u16> for CompressionMethod {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Store),
            8 => Ok(Self::Deflate),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        // Fixed sizes from the zip application note, signature excluded.
        assert_eq!(std::mem::size_of::<EocdRecord>(), 18);
        assert_eq!(std::mem::size_of::<CentralDirectoryHeader>(), 42);
        assert_eq!(std::mem::size_of::<LocalFileHeader>(), 26);
    }

    #[test]
    fn test_compression_method() {
        assert_eq!(CompressionMethod::try_from(0), Ok(CompressionMethod::Store));
        assert_eq!(CompressionMethod::try_from(8), Ok(CompressionMethod::Deflate));
        assert_eq!(CompressionMethod::try_from(12), Err(12));
    }
}
