//! Strata - layered virtual filesystem over loose directories and pak archives.
//!
//! This crate provides a unified interface to the Strata crates.
//!
//! # Crates
//!
//! - [`strata_common`] - Common utilities (binary reading, CRC-32, logical paths)
//! - [`strata_pak`] - Pak archive reading (zip central directory + streaming inflate)
//! - [`strata_vfs`] - Search paths, resource directories, mods and pure mode
//!
//! # Example
//!
//! ```no_run
//! use std::io::Read;
//! use strata::prelude::*;
//!
//! let vfs = Vfs::new(
//!     VfsConfig::new()
//!         .search_path("/opt/game")
//!         .search_path("/home/player/.game"),
//! )?;
//!
//! // Loose files beat archives, later search paths beat earlier ones.
//! let mut file = vfs.open_read("maps/start.bsp", Lookup::Layered, false)?;
//! let mut data = Vec::new();
//! file.read_to_end(&mut data)?;
//!
//! // Switching mods closes every open handle.
//! vfs.change_mod("ctf")?;
//!
//! // Archives can also be read on their own.
//! let archive = PakArchive::open("/opt/game/base/pak0.pak")?;
//! println!("{} entries", archive.entry_count());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use strata_common as common;
pub use strata_pak as pak;
pub use strata_vfs as vfs;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use strata_common::{crc, BinaryReader};
    pub use strata_pak::{CrcStatus, PakArchive, PakEntry, PakReader};
    pub use strata_vfs::{
        ErrorKind, FileHandle, FileMeta, FileOrigin, ListFlags, LoadedFile, Lookup, ModInfo,
        Vfs, VfsConfig,
    };
}

pub use strata_vfs::{Error, Result, Vfs, VfsConfig};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
