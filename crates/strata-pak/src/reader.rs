//! Streaming reader over a single archive entry.
//!
//! Stored entries are read straight from the backing stream and seek in O(1).
//! Deflate entries are inflated incrementally through a bounded input buffer;
//! a forward seek inflates and discards the gap, a backward seek rewinds to
//! the entry start first. Seeking a compressed entry therefore costs
//! O(distance from entry start).

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use flate2::{Decompress, FlushDecompress, Status};
use strata_common::crc::Hasher;
use tracing::warn;

use crate::archive::PakArchive;
use crate::entry::PakEntry;
use crate::zip::CompressionMethod;
use crate::{Error, Result};

/// Compressed bytes pulled from the archive per refill.
const INPUT_BUFFER_SIZE: usize = 16 * 1024;

/// Scratch size used when discarding bytes for a forward seek.
const SKIP_BUFFER_SIZE: usize = 8 * 1024;

/// Outcome of the end-of-stream checksum comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcStatus {
    /// End of stream not reached yet.
    Pending,
    /// All bytes were hashed and matched the central directory.
    Verified,
    /// All bytes were hashed and did not match.
    Mismatch { expected: u32, actual: u32 },
    /// The entry was not read contiguously from its start, nothing to compare.
    Unverifiable,
}

/// Raw-deflate decoder state.
struct Inflate {
    decompress: Decompress,
    input: Box<[u8]>,
    input_pos: usize,
    input_len: usize,
    /// Compressed bytes fetched from the archive so far
    fetched: u64,
}

impl Inflate {
    fn new() -> Self {
        Self {
            // Raw deflate: no zlib header.
            decompress: Decompress::new(false),
            input: vec![0u8; INPUT_BUFFER_SIZE].into_boxed_slice(),
            input_pos: 0,
            input_len: 0,
            fetched: 0,
        }
    }

    fn reset(&mut self) {
        self.decompress.reset(false);
        self.input_pos = 0;
        self.input_len = 0;
        self.fetched = 0;
    }
}

/// A streaming reader over one archive entry.
///
/// Implements [`Read`] and [`Seek`]. The reader keeps its archive alive
/// through an `Arc`. A single reader is not meant to be shared between
/// threads; open one reader per consumer instead.
pub struct PakReader {
    archive: Arc<PakArchive>,
    entry: PakEntry,
    /// Uncompressed bytes delivered so far
    position: u64,
    inflate: Option<Inflate>,
    hasher: Hasher,
    /// Bytes from the entry start covered by `hasher`
    hashed: u64,
    crc: CrcStatus,
    /// Whether a mismatch was already surfaced as an error
    reported: bool,
}

impl PakReader {
    pub(crate) fn new(archive: Arc<PakArchive>, entry: PakEntry) -> Self {
        let inflate = match entry.compression_method() {
            CompressionMethod::Store => None,
            CompressionMethod::Deflate => Some(Inflate::new()),
        };
        Self {
            archive,
            entry,
            position: 0,
            inflate,
            hasher: Hasher::new(),
            hashed: 0,
            crc: CrcStatus::Pending,
            reported: false,
        }
    }

    /// The entry being read.
    #[inline]
    pub fn entry(&self) -> &PakEntry {
        &self.entry
    }

    /// The archive this reader belongs to.
    #[inline]
    pub fn archive(&self) -> &Arc<PakArchive> {
        &self.archive
    }

    /// Current position in uncompressed bytes.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Uncompressed length of the entry.
    #[inline]
    pub fn len(&self) -> u64 {
        self.entry.uncompressed_size()
    }

    /// Whether the entry is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checksum state; settles once the last byte has been delivered.
    #[inline]
    pub fn crc_status(&self) -> CrcStatus {
        self.crc
    }

    /// Fail if the checksum was compared and did not match.
    ///
    /// Marks the mismatch as reported, so dropping the reader stays quiet.
    pub fn verify(&mut self) -> Result<()> {
        match self.crc {
            CrcStatus::Mismatch { expected, actual } => {
                self.reported = true;
                Err(self.mismatch_error(expected, actual))
            }
            _ => Ok(()),
        }
    }

    fn mismatch_error(&self, expected: u32, actual: u32) -> Error {
        Error::CrcMismatch {
            name: self.entry.name().to_string(),
            expected,
            actual,
        }
    }

    fn remaining(&self) -> u64 {
        self.len() - self.position
    }

    /// Reset decoder, checksum and counters to the entry start.
    fn reset(&mut self) {
        if let Some(inflate) = self.inflate.as_mut() {
            inflate.reset();
        }
        self.position = 0;
        self.hasher = Hasher::new();
        self.hashed = 0;
        self.crc = CrcStatus::Pending;
        self.reported = false;
    }

    fn read_stored(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let offset = self.entry.data_offset() + self.position;
        self.archive.read_at(offset, buf)?;
        Ok(buf.len())
    }

    fn read_deflate(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let compressed_size = self.entry.compressed_size();
        let data_offset = self.entry.data_offset();
        let archive = &self.archive;
        let Some(inflate) = self.inflate.as_mut() else {
            return Ok(0);
        };

        let mut produced = 0;
        while produced < buf.len() {
            if inflate.input_pos == inflate.input_len && inflate.fetched < compressed_size {
                let n = (compressed_size - inflate.fetched).min(INPUT_BUFFER_SIZE as u64) as usize;
                archive.read_at(data_offset + inflate.fetched, &mut inflate.input[..n])?;
                inflate.fetched += n as u64;
                inflate.input_pos = 0;
                inflate.input_len = n;
            }

            let before_in = inflate.decompress.total_in();
            let before_out = inflate.decompress.total_out();
            let status = inflate
                .decompress
                .decompress(
                    &inflate.input[inflate.input_pos..inflate.input_len],
                    &mut buf[produced..],
                    FlushDecompress::None,
                )
                .map_err(|e| {
                    io::Error::new(io::ErrorKind::InvalidData, Error::Decompression(e.to_string()))
                })?;
            let consumed = (inflate.decompress.total_in() - before_in) as usize;
            let written = (inflate.decompress.total_out() - before_out) as usize;
            inflate.input_pos += consumed;
            produced += written;

            if status == Status::StreamEnd {
                break;
            }
            if consumed == 0 && written == 0 {
                let exhausted =
                    inflate.input_pos == inflate.input_len && inflate.fetched >= compressed_size;
                let kind = if exhausted {
                    io::ErrorKind::UnexpectedEof
                } else {
                    io::ErrorKind::InvalidData
                };
                return Err(io::Error::new(kind, "deflate stream ended early"));
            }
        }

        if produced == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "entry is shorter than its declared size",
            ));
        }
        Ok(produced)
    }

    /// Compare the checksum once the last byte has been delivered.
    fn settle_crc(&mut self) {
        if self.crc != CrcStatus::Pending {
            return;
        }
        if self.hashed != self.len() {
            self.crc = CrcStatus::Unverifiable;
            return;
        }
        let expected = self.entry.crc32();
        let actual = self.hasher.clone().finalize();
        self.crc = if actual == expected {
            CrcStatus::Verified
        } else {
            warn!(
                archive = self.archive.name(),
                entry = self.entry.name(),
                expected,
                actual,
                "CRC mismatch"
            );
            CrcStatus::Mismatch { expected, actual }
        };
    }

    /// Inflate and discard `count` bytes.
    fn skip(&mut self, mut count: u64) -> io::Result<()> {
        let mut scratch = [0u8; SKIP_BUFFER_SIZE];
        while count > 0 {
            let n = count.min(SKIP_BUFFER_SIZE as u64) as usize;
            let read = self.read(&mut scratch[..n])?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "seek ran past the end of the entry",
                ));
            }
            count -= read as u64;
        }
        Ok(())
    }
}

impl Read for PakReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = (buf.len() as u64).min(self.remaining()) as usize;
        if want == 0 {
            if self.remaining() == 0 {
                self.settle_crc();
                if let CrcStatus::Mismatch { expected, actual } = self.crc {
                    if !self.reported {
                        self.reported = true;
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            self.mismatch_error(expected, actual),
                        ));
                    }
                }
            }
            return Ok(0);
        }

        let buf = &mut buf[..want];
        let n = if self.inflate.is_some() {
            self.read_deflate(buf)?
        } else {
            self.read_stored(buf)?
        };

        if self.hashed == self.position {
            self.hasher.update(&buf[..n]);
            self.hashed += n as u64;
        }
        self.position += n as u64;

        if self.remaining() == 0 {
            self.settle_crc();
        }
        Ok(n)
    }
}

impl Seek for PakReader {
    /// Seeking past the end clamps to the entry length.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::End(delta) => self.len() as i128 + delta as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the start of the entry",
            ));
        }
        let target = (target as u64).min(self.len());

        if target == self.position {
            return Ok(self.position);
        }
        if target == 0 {
            self.reset();
            return Ok(0);
        }

        if self.inflate.is_some() {
            if target < self.position {
                self.reset();
            }
            self.skip(target - self.position)?;
        } else {
            self.position = target;
        }
        Ok(self.position)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

impl Drop for PakReader {
    fn drop(&mut self) {
        if let CrcStatus::Mismatch { expected, actual } = self.crc {
            if !self.reported {
                warn!(
                    archive = self.archive.name(),
                    entry = self.entry.name(),
                    expected,
                    actual,
                    "closing reader with unreported CRC mismatch"
                );
            }
        }
    }
}

impl std::fmt::Debug for PakReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakReader")
            .field("archive", &self.archive.name())
            .field("entry", &self.entry.name())
            .field("position", &self.position)
            .field("crc", &self.crc)
            .finish()
    }
}
