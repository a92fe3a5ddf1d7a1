//! End of Central Directory (EOCD) structures.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// End of Central Directory Record (without signature).
///
/// This is the standard zip EOCD record found at the end of the archive,
/// optionally followed by a comment of up to 65535 bytes.
/// The 4-byte signature (0x06054b50) is read separately before this struct.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct EocdRecord {
    /// Number of this disk
    pub disk_number: u16,
    /// Disk where central directory starts
    pub central_dir_disk: u16,
    /// Number of central directory records on this disk
    pub central_dir_count_disk: u16,
    /// Total number of central directory records
    pub central_dir_count_total: u16,
    /// Size of central directory (bytes)
    pub central_dir_size: u32,
    /// Offset of start of central directory
    pub central_dir_offset: u32,
    /// Comment length
    pub comment_length: u16,
}

impl EocdRecord {
    /// EOCD signature bytes.
    pub const MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

    /// EOCD signature as u32.
    pub const SIGNATURE: u32 = 0x06054b50;

    /// Size of the record including its signature.
    pub const SIZE_WITH_SIGNATURE: usize = 4 + std::mem::size_of::<Self>();

    /// Largest comment the format allows.
    pub const MAX_COMMENT: usize = u16::MAX as usize;

    /// Check if any field carries a ZIP64 sentinel value.
    pub fn is_zip64(&self) -> bool {
        self.central_dir_count_total == 0xFFFF
            || self.central_dir_offset == 0xFFFFFFFF
            || self.central_dir_size == 0xFFFFFFFF
    }

    /// Check if the archive spans more than one volume.
    pub fn is_multi_volume(&self) -> bool {
        self.disk_number != 0 || self.central_dir_disk != 0
    }
}
