//! Layered virtual filesystem.
//!
//! Merges loose directories and pak archives into one namespace:
//!
//! - **Search paths**: root directories such as the install dir and the
//!   user's home dir. Later ones take precedence.
//! - **Resource directories**: subdirectories of every search path, the base
//!   directory first and the active mod last.
//! - **Archives**: `*.pak` files inside each resource directory, split into a
//!   base list and a mod list that is rebuilt on every mod switch.
//!
//! ```no_run
//! use std::io::Read;
//! use strata_vfs::{Lookup, ListFlags, Vfs, VfsConfig};
//!
//! let vfs = Vfs::new(VfsConfig::new().search_path("/opt/game"))?;
//! let mut file = vfs.open_read("maps/start.bsp", Lookup::Layered, false)?;
//! let mut data = Vec::new();
//! file.read_to_end(&mut data)?;
//!
//! for name in vfs.list_files("textures", "png", ListFlags::FILES)? {
//!     println!("{name}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod error;
mod flags;
mod handle;
mod housekeeper;
mod listing;
mod local;
mod mods;
mod quiet;
mod vfs;

pub use config::{VfsConfig, DEFAULT_BASE_DIR, DEFAULT_PAK_EXTENSION, MOD_DESCRIPTION_FILE};
pub use error::{Error, ErrorKind, Result};
pub use flags::ListFlags;
pub use handle::{FileHandle, FileOrigin, LoadedFile};
pub use housekeeper::Tracked;
pub use mods::ModInfo;
pub use vfs::{FileMeta, Lookup, Vfs};
