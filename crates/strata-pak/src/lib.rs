//! Streaming reader for zip-format pak archives.
//!
//! A pak is a plain zip file. This crate accepts the subset a game content
//! pipeline produces:
//!
//! - Stored (method 0) and DEFLATE (method 8) entries
//! - UTF-8 names (general purpose bit 11) or OEM code page 437 names
//! - Arbitrary prefix bytes such as self-extract stubs
//! - Trailing comments up to 65535 bytes
//!
//! Multi-volume, ZIP64 and encrypted archives are rejected.
//!
//! Entries are never inflated whole. [`PakReader`] streams an entry through
//! a 16 KiB input buffer and verifies its CRC-32 at end of stream.
//!
//! # Example
//!
//! ```no_run
//! use std::io::Read;
//! use strata_pak::PakArchive;
//!
//! let archive = PakArchive::open("base/pak0.pak")?;
//!
//! for entry in archive.entries() {
//!     println!("{}: {} bytes", entry.name(), entry.uncompressed_size());
//! }
//!
//! let mut reader = archive.open_entry("scripts/autoexec.cfg")?;
//! let mut text = String::new();
//! reader.read_to_string(&mut text)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod archive;
mod cp437;
mod entry;
mod error;
mod reader;
pub mod zip;

pub use archive::{PakArchive, Source};
pub use entry::PakEntry;
pub use error::{Error, Result};
pub use reader::{CrcStatus, PakReader};
pub use zip::CompressionMethod;
