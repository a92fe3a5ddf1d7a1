//! Pak archive entry.

use std::time::SystemTime;

use crate::zip::CompressionMethod;

/// An entry (file or directory) within a pak archive.
///
/// This contains metadata about the entry, not the data itself.
/// Use [`PakArchive::open_entry`](crate::PakArchive::open_entry) to stream it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakEntry {
    /// Forward-slash normalized path, without a trailing slash.
    name: String,
    /// Whether the central directory named this entry with a trailing slash.
    is_dir: bool,
    /// Compression method used.
    compression_method: CompressionMethod,
    /// CRC32 checksum of uncompressed data.
    crc32: u32,
    /// Compressed size in bytes.
    compressed_size: u64,
    /// Uncompressed size in bytes.
    uncompressed_size: u64,
    /// Absolute offset of the first payload byte in the archive.
    data_offset: u64,
    /// DOS date/time of last modification.
    dos_datetime: u32,
}

impl PakEntry {
    /// Create a new pak entry.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        is_dir: bool,
        compression_method: CompressionMethod,
        crc32: u32,
        compressed_size: u64,
        uncompressed_size: u64,
        data_offset: u64,
        dos_datetime: u32,
    ) -> Self {
        Self {
            name,
            is_dir,
            compression_method,
            crc32,
            compressed_size,
            uncompressed_size,
            data_offset,
            dos_datetime,
        }
    }

    /// Get the file name/path.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this entry represents a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Get the compression method.
    #[inline]
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    /// Get the CRC32 checksum.
    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Get the compressed size in bytes.
    #[inline]
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Get the uncompressed size in bytes.
    #[inline]
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Get the absolute offset of the payload.
    #[inline]
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Raw DOS date/time.
    #[inline]
    pub fn dos_datetime(&self) -> u32 {
        self.dos_datetime
    }

    /// Get the last modification time as a SystemTime.
    ///
    /// Returns None if the DOS datetime is invalid.
    pub fn last_modified(&self) -> Option<SystemTime> {
        dos_datetime_to_system_time(self.dos_datetime)
    }

    /// Get the file extension, if any.
    pub fn extension(&self) -> Option<&str> {
        strata_common::path::extension(&self.name)
    }
}

/// Convert DOS date/time format to SystemTime.
///
/// DOS date/time format:
/// - Time: bits 0-4 = seconds/2, bits 5-10 = minutes, bits 11-15 = hours
/// - Date: bits 16-20 = day, bits 21-24 = month, bits 25-31 = year-1980
///
/// The value is interpreted as UTC.
fn dos_datetime_to_system_time(datetime: u32) -> Option<SystemTime> {
    let year = 1980 + ((datetime >> 25) & 0x7F) as i32;
    let month = (datetime >> 21) & 0x0F;
    let day = (datetime >> 16) & 0x1F;
    let hour = (datetime >> 11) & 0x1F;
    let minute = (datetime >> 5) & 0x3F;
    let second = (datetime & 0x1F) * 2;

    if !(1..=12).contains(&month)
        || !(1..=31).contains(&day)
        || hour > 23
        || minute > 59
        || second > 59
    {
        return None;
    }

    let mut days = 0u64;
    for y in 1970..year {
        days += if is_leap_year(y) { 366 } else { 365 };
    }

    const DAYS_IN_MONTH: [u64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    for m in 1..month {
        days += DAYS_IN_MONTH[(m - 1) as usize];
        if m == 2 && is_leap_year(year) {
            days += 1;
        }
    }
    days += (day - 1) as u64;

    let secs = days * 86400 + hour as u64 * 3600 + minute as u64 * 60 + second as u64;
    std::time::UNIX_EPOCH.checked_add(std::time::Duration::from_secs(secs))
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn entry(name: &str, dos_datetime: u32) -> PakEntry {
        PakEntry::new(
            name.to_string(),
            false,
            CompressionMethod::Store,
            0,
            0,
            0,
            0,
            dos_datetime,
        )
    }

    #[test]
    fn test_extension() {
        assert_eq!(entry("textures/wall.dds", 0).extension(), Some("dds"));
        assert_eq!(entry("README", 0).extension(), None);
    }

    #[test]
    fn test_last_modified() {
        // 2000-03-01 12:30:10
        let date = ((2000 - 1980) << 9) | (3 << 5) | 1;
        let time = (12 << 11) | (30 << 5) | 5;
        let e = entry("a", (date << 16) | time);
        let expected = UNIX_EPOCH + Duration::from_secs(951_913_810);
        assert_eq!(e.last_modified(), Some(expected));
    }

    #[test]
    fn test_invalid_datetime() {
        // Month zero.
        assert_eq!(entry("a", 0).last_modified(), None);
    }
}
