//! Pak archive: central directory parsing and shared backing stream.
//!
//! Parsing works from the end of the file:
//! 1. Find the End of Central Directory record in the trailing 64 KiB + 22 bytes
//! 2. Derive the base offset, which absorbs any prefix such as a self-extract stub
//! 3. Walk the central directory and cross-check every entry's local header

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memchr::memmem;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use strata_common::{BinaryReader, ReadExt};
use tracing::{debug, warn};

use crate::cp437;
use crate::entry::PakEntry;
use crate::reader::PakReader;
use crate::zip::{flags, CentralDirectoryHeader, CompressionMethod, EocdRecord, LocalFileHeader};
use crate::{Error, Result};

/// Backing stream of an archive.
pub trait Source: Read + Seek + Send {}

impl<T: Read + Seek + Send> Source for T {}

/// An opened pak archive.
///
/// The archive is always handed out as an `Arc`: every [`PakReader`] keeps a
/// strong reference, so the central directory and the backing stream outlive
/// all readers created from it.
pub struct PakArchive {
    /// Path on disk, when opened from a file
    path: Option<PathBuf>,
    /// Display name
    name: String,
    /// Backing stream, shared by all readers
    source: Mutex<Box<dyn Source>>,
    /// Entries keyed by normalized name
    entries: FxHashMap<String, PakEntry>,
}

impl PakArchive {
    /// Open and validate a pak archive on disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let entries = read_central_directory(&mut file)?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        debug!(archive = %path.display(), entries = entries.len(), "opened pak archive");

        Ok(Arc::new(Self {
            path: Some(path.to_path_buf()),
            name,
            source: Mutex::new(Box::new(file)),
            entries,
        }))
    }

    /// Open a pak archive from any seekable stream.
    pub fn from_reader<R: Source + 'static>(
        name: impl Into<String>,
        mut reader: R,
    ) -> Result<Arc<Self>> {
        let entries = read_central_directory(&mut reader)?;
        Ok(Arc::new(Self {
            path: None,
            name: name.into(),
            source: Mutex::new(Box::new(reader)),
            entries,
        }))
    }

    /// Path on disk, if the archive was opened from a file.
    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get the archive name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Look up an entry by its normalized name.
    #[inline]
    pub fn entry(&self, name: &str) -> Option<&PakEntry> {
        self.entries.get(name)
    }

    /// Check whether a file (not directory) entry exists.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|e| !e.is_dir())
    }

    /// Iterate over all entries in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = &PakEntry> + '_ {
        self.entries.values()
    }

    /// Open a streaming reader over one entry.
    pub fn open_entry(self: &Arc<Self>, name: &str) -> Result<PakReader> {
        let entry = self
            .entries
            .get(name)
            .filter(|e| !e.is_dir())
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        Ok(PakReader::new(Arc::clone(self), entry.clone()))
    }

    /// Read a whole entry and verify its checksum.
    pub fn read(self: &Arc<Self>, name: &str) -> Result<Vec<u8>> {
        let mut reader = self.open_entry(name)?;
        // Grows with the data actually inflated, not the declared size.
        let mut data = Vec::new();
        if let Err(e) = reader.read_to_end(&mut data) {
            reader.verify()?;
            return Err(e.into());
        }
        reader.verify()?;
        Ok(data)
    }

    /// Positional read from the backing stream.
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut source = self.source.lock();
        source.seek(SeekFrom::Start(offset))?;
        source.read_exact(buf)
    }
}

impl fmt::Debug for PakArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PakArchive")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Locate the EOCD record and parse every central directory entry.
pub(crate) fn read_central_directory<R: Read + Seek + ?Sized>(
    reader: &mut R,
) -> Result<FxHashMap<String, PakEntry>> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    let (eocd, record_offset) = find_eocd(reader, file_len)?;

    if eocd.central_dir_count_total == 0 {
        return Err(Error::EmptyArchive);
    }
    if eocd.is_multi_volume() {
        return Err(Error::MultiVolume {
            disk: eocd.disk_number,
            central_dir_disk: eocd.central_dir_disk,
        });
    }
    if eocd.is_zip64() {
        return Err(Error::Zip64Unsupported);
    }

    let cd_size = eocd.central_dir_size as u64;
    let cd_end = eocd.central_dir_offset as u64 + cd_size;
    let base_offset = record_offset
        .checked_sub(cd_end)
        .ok_or(Error::InconsistentDirectory("central directory extends past its end record"))?;

    reader.seek(SeekFrom::Start(eocd.central_dir_offset as u64 + base_offset))?;
    let cd_data = reader.read_vec(cd_size as usize)?;
    let mut cd = BinaryReader::new(&cd_data);

    let count = eocd.central_dir_count_total as usize;
    let mut entries = FxHashMap::with_capacity_and_hasher(count, Default::default());
    // (local header start, payload end, name) per record.
    let mut spans = Vec::with_capacity(count);

    for _ in 0..count {
        let offset = base_offset + eocd.central_dir_offset as u64 + cd.position() as u64;
        let sig = cd.read_u32()?;
        if sig != CentralDirectoryHeader::SIGNATURE {
            return Err(Error::InvalidSignature {
                expected: CentralDirectoryHeader::SIGNATURE,
                actual: sig,
                offset,
            });
        }

        let header: CentralDirectoryHeader = cd.read_struct()?;
        let raw_name = cd.read_bytes(header.file_name_length as usize)?;
        cd.skip(header.trailing_data_size())?;

        let decoded = if header.flags & flags::UTF8 != 0 {
            std::str::from_utf8(raw_name)
                .map_err(strata_common::Error::from)?
                .to_string()
        } else {
            cp437::decode(raw_name)
        };

        let compression_method = CompressionMethod::try_from(header.compression_method)
            .map_err(|method| Error::UnsupportedCompression {
                name: decoded.clone(),
                method,
            })?;
        if header.flags & flags::ENCRYPTED != 0 {
            return Err(Error::Encrypted(decoded));
        }

        let decoded = decoded.replace('\\', "/");
        let (trimmed, is_dir) = match decoded.strip_suffix('/') {
            Some(stripped) => (stripped, true),
            None => (decoded.as_str(), false),
        };

        let data_offset = check_local_header(reader, base_offset, &header, &decoded)?;
        spans.push((
            base_offset + header.local_header_offset as u64,
            data_offset + header.compressed_size as u64,
            decoded.clone(),
        ));

        let name = match strata_common::path::normalize(trimmed) {
            Ok(name) if !name.is_empty() => name,
            _ => {
                warn!(entry = %decoded, "skipping entry with unusable name");
                continue;
            }
        };

        let entry = PakEntry::new(
            name.clone(),
            is_dir,
            compression_method,
            header.crc32,
            header.compressed_size as u64,
            header.uncompressed_size as u64,
            data_offset,
            header.last_modified,
        );

        if compression_method == CompressionMethod::Store
            && entry.compressed_size() != entry.uncompressed_size()
        {
            return Err(Error::CorruptEntry {
                name,
                reason: "stored entry sizes differ",
            });
        }
        if data_offset + entry.compressed_size() > record_offset {
            return Err(Error::CorruptEntry {
                name,
                reason: "payload extends into the central directory",
            });
        }

        // Last duplicate wins.
        entries.insert(name, entry);
    }

    check_payload_overlap(spans)?;
    Ok(entries)
}

/// Every payload must end before the next local header starts.
fn check_payload_overlap(mut spans: Vec<(u64, u64, String)>) -> Result<()> {
    spans.sort_unstable_by_key(|span| span.0);
    for pair in spans.windows(2) {
        let (start, end, name) = &pair[0];
        if *start != pair[1].0 && *end > pair[1].0 {
            return Err(Error::CorruptEntry {
                name: name.clone(),
                reason: "payload overlaps the next entry",
            });
        }
    }
    Ok(())
}

/// Scan the trailing bytes backwards for the EOCD signature.
fn find_eocd<R: Read + Seek + ?Sized>(reader: &mut R, file_len: u64) -> Result<(EocdRecord, u64)> {
    let max_tail = (EocdRecord::MAX_COMMENT + EocdRecord::SIZE_WITH_SIGNATURE) as u64;
    let tail_len = file_len.min(max_tail);
    let tail_start = file_len - tail_len;

    reader.seek(SeekFrom::Start(tail_start))?;
    let tail = reader.read_vec(tail_len as usize)?;

    let pos = memmem::rfind_iter(&tail, &EocdRecord::MAGIC)
        .find(|&pos| pos + EocdRecord::SIZE_WITH_SIGNATURE <= tail.len())
        .ok_or(Error::EocdNotFound)?;

    let mut record = BinaryReader::new_at(&tail, pos + 4);
    let eocd: EocdRecord = record.read_struct()?;

    Ok((eocd, tail_start + pos as u64))
}

/// Validate an entry's local header against its central record and return
/// the absolute payload offset.
fn check_local_header<R: Read + Seek + ?Sized>(
    reader: &mut R,
    base_offset: u64,
    central: &CentralDirectoryHeader,
    name: &str,
) -> Result<u64> {
    let corrupt = |reason| Error::CorruptEntry {
        name: name.to_string(),
        reason,
    };

    let header_offset = base_offset + central.local_header_offset as u64;
    reader.seek(SeekFrom::Start(header_offset))?;

    let mut sig = [0u8; 4];
    reader
        .read_exact(&mut sig)
        .map_err(|_| corrupt("local header out of bounds"))?;
    if sig != LocalFileHeader::MAGIC {
        return Err(corrupt("bad local header signature"));
    }

    let local: LocalFileHeader = reader
        .read_struct()
        .map_err(|_| corrupt("local header out of bounds"))?;

    if local.compression_method != central.compression_method {
        return Err(corrupt("compression method differs from central directory"));
    }
    if local.file_name_length != central.file_name_length {
        return Err(corrupt("file name length differs from central directory"));
    }
    if local.flags & flags::DATA_DESCRIPTOR == 0
        && (local.crc32 != central.crc32
            || local.compressed_size != central.compressed_size
            || local.uncompressed_size != central.uncompressed_size)
    {
        return Err(corrupt("checksum or sizes differ from central directory"));
    }

    Ok(header_offset + LocalFileHeader::SIZE_WITH_SIGNATURE + local.variable_data_size())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    /// Build an archive in memory. `deflate` selects the method per file.
    pub(crate) fn build_archive(files: &[(&str, &[u8], bool)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, deflate) in files {
            let method = if *deflate {
                zip::CompressionMethod::Deflated
            } else {
                zip::CompressionMethod::Stored
            };
            let options = SimpleFileOptions::default().compression_method(method);
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn scenario_archive() -> Vec<u8> {
        let zeros = vec![0u8; 100_000];
        build_archive(&[("a.txt", b"hello", false), ("b/c.txt", &zeros, true)])
    }

    #[test]
    fn test_parse_entries() {
        let archive = PakArchive::from_reader("base.pak", Cursor::new(scenario_archive())).unwrap();
        assert_eq!(archive.entry_count(), 2);

        let a = archive.entry("a.txt").unwrap();
        assert_eq!(a.compression_method(), CompressionMethod::Store);
        assert_eq!(a.uncompressed_size(), 5);
        assert_eq!(a.crc32(), strata_common::crc::hash_bytes(b"hello"));

        let c = archive.entry("b/c.txt").unwrap();
        assert_eq!(c.compression_method(), CompressionMethod::Deflate);
        assert_eq!(c.uncompressed_size(), 100_000);
        assert!(c.compressed_size() < 100_000);
    }

    #[test]
    fn test_directory_entries() {
        let data = build_archive(&[("maps/", b"", false), ("maps/e1m1.bsp", b"bsp", false)]);
        let archive = PakArchive::from_reader("dirs.pak", Cursor::new(data)).unwrap();

        let dir = archive.entry("maps").unwrap();
        assert!(dir.is_dir());
        assert!(!archive.contains("maps"));
        assert!(archive.contains("maps/e1m1.bsp"));
        assert!(matches!(archive.open_entry("maps"), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn test_read_whole_entry() {
        let archive = PakArchive::from_reader("base.pak", Cursor::new(scenario_archive())).unwrap();
        assert_eq!(archive.read("a.txt").unwrap(), b"hello");
        assert_eq!(archive.read("b/c.txt").unwrap(), vec![0u8; 100_000]);
        assert!(matches!(archive.read("missing"), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn test_prefix_bytes_are_tolerated() {
        let mut data = vec![0xAAu8; 1000];
        data.extend(scenario_archive());
        let archive = PakArchive::from_reader("sfx.pak", Cursor::new(data)).unwrap();
        assert_eq!(archive.read("a.txt").unwrap(), b"hello");
    }

    #[test]
    fn test_trailing_comment() {
        let mut data = scenario_archive();
        // Rewrite the EOCD comment length and append a comment.
        let comment = b"built by a packing tool";
        let len = data.len();
        data[len - 2..].copy_from_slice(&(comment.len() as u16).to_le_bytes());
        data.extend_from_slice(comment);
        let archive = PakArchive::from_reader("comment.pak", Cursor::new(data)).unwrap();
        assert_eq!(archive.read("a.txt").unwrap(), b"hello");
    }

    #[test]
    fn test_missing_eocd() {
        let err = PakArchive::from_reader("junk.pak", Cursor::new(vec![0u8; 4096])).unwrap_err();
        assert!(matches!(err, Error::EocdNotFound));
        assert!(err.is_bad_archive());

        let err = PakArchive::from_reader("tiny.pak", Cursor::new(b"PK".to_vec())).unwrap_err();
        assert!(matches!(err, Error::EocdNotFound));
    }

    #[test]
    fn test_empty_archive() {
        let data = build_archive(&[]);
        let err = PakArchive::from_reader("empty.pak", Cursor::new(data)).unwrap_err();
        assert!(matches!(err, Error::EmptyArchive));
    }

    #[test]
    fn test_multi_volume_rejected() {
        let mut data = scenario_archive();
        let eocd = data.len() - EocdRecord::SIZE_WITH_SIGNATURE;
        data[eocd + 4] = 1; // disk_number
        let err = PakArchive::from_reader("split.pak", Cursor::new(data)).unwrap_err();
        assert!(matches!(err, Error::MultiVolume { disk: 1, .. }));
        assert!(err.is_bad_archive());
    }

    #[test]
    fn test_local_header_name_length_mismatch() {
        let mut data = scenario_archive();
        // First local header sits at offset 0; file_name_length is at 26.
        assert_eq!(&data[..4], &LocalFileHeader::MAGIC);
        let len = u16::from_le_bytes([data[26], data[27]]);
        data[26..28].copy_from_slice(&(len + 1).to_le_bytes());

        let err = PakArchive::from_reader("corrupt.pak", Cursor::new(data)).unwrap_err();
        assert!(err.is_corrupt_entry(), "{err}");
    }

    #[test]
    fn test_unsupported_compression_rejected() {
        let mut data = build_archive(&[("a.txt", b"hello", false)]);
        let eocd = data.len() - EocdRecord::SIZE_WITH_SIGNATURE;
        let mut record = BinaryReader::new_at(&data, eocd + 4);
        let eocd: EocdRecord = record.read_struct().unwrap();
        // compression_method lives 10 bytes into the central header.
        let method_at = eocd.central_dir_offset as usize + 10;
        data[method_at..method_at + 2].copy_from_slice(&14u16.to_le_bytes());
        data[8..10].copy_from_slice(&14u16.to_le_bytes());

        let err = PakArchive::from_reader("lzma.pak", Cursor::new(data)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCompression { method: 14, .. }));
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        let data = build_archive(&[("x.txt", b"first", false), ("y.txt", b"second", false)]);
        let mut data = data;
        // Rename y.txt to x.txt in both headers; names have equal length.
        let needle = b"y.txt";
        let positions: Vec<usize> = memmem::find_iter(&data, needle).collect();
        assert_eq!(positions.len(), 2);
        for pos in positions {
            data[pos] = b'x';
        }
        let archive = PakArchive::from_reader("dup.pak", Cursor::new(data)).unwrap();
        assert_eq!(archive.entry_count(), 1);
        assert_eq!(archive.read("x.txt").unwrap(), b"second");
    }

    /// Offset of the first central directory record.
    fn central_record(data: &[u8]) -> usize {
        memmem::find(data, &CentralDirectoryHeader::MAGIC).unwrap()
    }

    /// Overwrite the compressed and uncompressed sizes of the first entry in
    /// both its local and central headers.
    fn patch_first_sizes(data: &mut [u8], compressed: Option<u32>, uncompressed: Option<u32>) {
        let central = central_record(data);
        if let Some(size) = compressed {
            data[18..22].copy_from_slice(&size.to_le_bytes());
            data[central + 20..central + 24].copy_from_slice(&size.to_le_bytes());
        }
        if let Some(size) = uncompressed {
            data[22..26].copy_from_slice(&size.to_le_bytes());
            data[central + 24..central + 28].copy_from_slice(&size.to_le_bytes());
        }
    }

    #[test]
    fn test_stored_size_mismatch_rejected() {
        let mut data = scenario_archive();
        patch_first_sizes(&mut data, None, Some(30));
        let err = PakArchive::from_reader("sizes.pak", Cursor::new(data)).unwrap_err();
        assert!(err.is_corrupt_entry(), "{err}");
    }

    #[test]
    fn test_payload_overlapping_next_header_rejected() {
        // a.txt is stored and followed by b/c.txt's local header.
        let mut data = scenario_archive();
        patch_first_sizes(&mut data, Some(30), Some(30));
        let err = PakArchive::from_reader("overlap.pak", Cursor::new(data)).unwrap_err();
        assert!(
            matches!(err, Error::CorruptEntry { ref name, .. } if name == "a.txt"),
            "{err}"
        );
    }

    #[test]
    fn test_inflated_size_claim_does_not_preallocate() {
        let mut data = build_archive(&[("a.txt", b"hello", true)]);
        patch_first_sizes(&mut data, None, Some(0x7FFF_FFFF));
        let archive = PakArchive::from_reader("huge.pak", Cursor::new(data)).unwrap();
        assert_eq!(archive.entry("a.txt").unwrap().uncompressed_size(), 0x7FFF_FFFF);

        // The stream ends after five bytes; nothing near the claim is allocated.
        let err = archive.read("a.txt").unwrap_err();
        assert!(
            matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof),
            "{err}"
        );
    }

    #[test]
    fn test_cp437_names() {
        let mut data = build_archive(&[("caf?.txt", b"x", false)]);
        let positions: Vec<usize> = memmem::find_iter(&data, b"caf?.txt").collect();
        for pos in positions {
            data[pos + 3] = 0x82; // 'é' in CP437
        }
        let archive = PakArchive::from_reader("oem.pak", Cursor::new(data)).unwrap();
        assert!(archive.contains("café.txt"));
    }
}
