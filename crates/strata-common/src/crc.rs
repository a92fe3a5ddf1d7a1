//! CRC-32 hashing utilities.
//!
//! Zip archives checksum every entry with the IEEE 802.3 polynomial (the
//! same CRC-32 used by zlib and PNG).

pub use crc32fast::Hasher;

/// Compute the CRC-32 of a byte slice.
#[inline]
pub fn hash_bytes(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_hash() {
        assert_eq!(hash_bytes(&[]), 0);
    }

    #[test]
    fn test_known_hash() {
        assert_eq!(hash_bytes(b"123456789"), 0xCBF4_3926);
        assert_eq!(hash_bytes(b"hello"), 0x3610_A686);
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let mut hasher = Hasher::new();
        hasher.update(b"hel");
        hasher.update(b"lo");
        assert_eq!(hasher.finalize(), hash_bytes(b"hello"));
    }
}
