//! The layered resolver.
//!
//! Lookup locations are the product of the search paths and the resource
//! directories, with the active mod acting as the highest resource directory.
//! Archives found in those locations form two lists: base archives and mod
//! archives. A read resolves in this order, first hit wins:
//!
//! 1. Loose files, unless pure mode hides them. Search paths are tried
//!    newest first, and within each search path the resource directories
//!    newest first, so the mod beats the base directory.
//! 2. Mod archives, newest first.
//! 3. Base archives, newest first.
//!
//! Writes go to `<user path>/<mod or base dir>/<path>`. Without an explicit
//! user path, the newest search path at the time of the write is used.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use strata_common::path;
use strata_pak::PakArchive;
use tracing::{debug, info, warn};

use crate::config::VfsConfig;
use crate::flags::ListFlags;
use crate::handle::{Backing, FileHandle, FileOrigin, LoadedFile};
use crate::housekeeper::{Housekeeper, Tracked};
use crate::listing::Listing;
use crate::local;
use crate::mods::{self, ModInfo};
use crate::quiet::{self, QuietNotFound};
use crate::{Error, Result};

/// How a path passed to the resolver is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lookup {
    /// A logical path, resolved through every layer.
    #[default]
    Layered,
    /// A plain disk path, used as is.
    Direct,
}

/// Metadata of a resolved file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Last modification time, when the source records one.
    pub modified: Option<SystemTime>,
    /// Where the file was found.
    pub origin: FileOrigin,
}

enum Resolved {
    Loose(PathBuf),
    Archived(Arc<PakArchive>),
}

struct State {
    search_paths: Vec<PathBuf>,
    resource_dirs: Vec<String>,
    active_mod: Option<String>,
    base_paks: Vec<Arc<PakArchive>>,
    mod_paks: Vec<Arc<PakArchive>>,
    pure: bool,
    pure_extensions: FxHashSet<String>,
    user_path: Option<PathBuf>,
    base_dir: String,
    pak_extension: String,
}

impl State {
    /// Resource directories in precedence order, lowest first.
    fn layers(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.resource_dirs
            .iter()
            .map(String::as_str)
            .chain(self.active_mod.as_deref())
    }

    /// Every archive in precedence order, highest first.
    fn archives(&self) -> impl Iterator<Item = &Arc<PakArchive>> + '_ {
        self.mod_paks.iter().rev().chain(self.base_paks.iter().rev())
    }

    fn loose_allowed(&self, logical: &str) -> bool {
        if !self.pure {
            return true;
        }
        path::extension(logical)
            .is_some_and(|ext| self.pure_extensions.contains(&path::normalize_extension(ext)))
    }

    fn resolve(&self, logical: &str) -> Option<Resolved> {
        if self.loose_allowed(logical) {
            let relative = local::to_disk(logical);
            for root in self.search_paths.iter().rev() {
                for layer in self.layers().rev() {
                    let candidate = root.join(layer).join(&relative);
                    if local::is_file(&candidate) {
                        return Some(Resolved::Loose(candidate));
                    }
                }
            }
        }

        self.archives()
            .find(|pak| pak.contains(logical))
            .map(|pak| Resolved::Archived(Arc::clone(pak)))
    }

    fn write_target(&self, logical: &str) -> Result<(PathBuf, PathBuf)> {
        let root = self
            .user_path
            .as_ref()
            .or_else(|| self.search_paths.last())
            .ok_or(Error::NoWritableRoot)?;
        let layer = self.active_mod.as_deref().unwrap_or(&self.base_dir);
        let target = root.join(layer).join(local::to_disk(logical));
        Ok((root.clone(), target))
    }

    fn scan_paks(&self, root: &Path, layer: &str) -> Vec<Arc<PakArchive>> {
        load_paks(&root.join(layer), &self.pak_extension)
    }
}

/// Open every archive directly inside `dir`, in name order.
///
/// Archives that fail to parse are skipped with a warning.
fn load_paks(dir: &Path, extension: &str) -> Vec<Arc<PakArchive>> {
    let Ok(children) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = children
        .flatten()
        .map(|child| child.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .collect();
    paths.sort();

    let mut paks = Vec::with_capacity(paths.len());
    for path in paths {
        match PakArchive::open(&path) {
            Ok(pak) => {
                info!(
                    archive = %path.display(),
                    entries = pak.entry_count(),
                    "loaded archive"
                );
                paks.push(pak);
            }
            Err(e) => warn!(archive = %path.display(), error = %e, "skipping bad archive"),
        }
    }
    paks
}

/// A layered virtual filesystem.
///
/// Cheap to share behind an `Arc`; every method takes `&self`. Configuration
/// changes take an exclusive lock, lookups a shared one.
pub struct Vfs {
    state: RwLock<State>,
    housekeeper: Housekeeper,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl Vfs {
    /// Build a filesystem from `config`, load the base archives and start the
    /// housekeeping thread.
    pub fn new(config: VfsConfig) -> Result<Self> {
        let housekeeper = Housekeeper::spawn()?;
        let user_path = config.user_path.clone();
        let state = State {
            search_paths: Vec::new(),
            resource_dirs: vec![config.base_dir.clone()],
            active_mod: None,
            base_paks: Vec::new(),
            mod_paks: Vec::new(),
            pure: config.pure,
            pure_extensions: config
                .pure_extensions
                .iter()
                .map(|e| path::normalize_extension(e))
                .collect(),
            user_path,
            base_dir: config.base_dir,
            pak_extension: path::normalize_extension(&config.pak_extension),
        };
        let vfs = Self {
            state: RwLock::new(state),
            housekeeper,
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        };

        for search_path in config.search_paths {
            vfs.add_search_path(search_path);
        }
        if let Some(name) = config.start_mod.filter(|m| !m.is_empty()) {
            vfs.change_mod(&name)?;
        }
        Ok(vfs)
    }

    /// Append a search path and load the archives below it. The new path
    /// takes precedence over every existing one.
    pub fn add_search_path(&self, root: impl Into<PathBuf>) {
        let root = root.into();
        let mut state = self.state.write();
        debug!(root = %root.display(), "adding search path");

        let mut base = Vec::new();
        for layer in &state.resource_dirs {
            base.extend(state.scan_paks(&root, layer));
        }
        let mods = match &state.active_mod {
            Some(name) => state.scan_paks(&root, name),
            None => Vec::new(),
        };
        state.base_paks.extend(base);
        state.mod_paks.extend(mods);
        state.search_paths.push(root);
    }

    /// Append a base resource directory and load its archives. It takes
    /// precedence over the existing base directories but not over the mod.
    pub fn add_resource_dir(&self, name: impl Into<String>) {
        let name = name.into();
        let mut state = self.state.write();
        if state.resource_dirs.iter().any(|d| d == &name) {
            return;
        }
        debug!(dir = %name, "adding resource directory");

        let mut base = Vec::new();
        for root in &state.search_paths {
            base.extend(state.scan_paks(root, &name));
        }
        state.base_paks.extend(base);
        state.resource_dirs.push(name);
    }

    /// Open one archive outside the layered set.
    ///
    /// Logs and returns `None` when the archive cannot be opened.
    pub fn open_archive(&self, path: impl AsRef<Path>) -> Option<Arc<PakArchive>> {
        let path = path.as_ref();
        match PakArchive::open(path) {
            Ok(pak) => Some(pak),
            Err(e) => {
                warn!(archive = %path.display(), error = %e, "cannot open archive");
                None
            }
        }
    }

    /// Open a file for reading.
    ///
    /// With `buffered`, the whole file is read into memory up front and the
    /// handle seeks freely; archive entries are CRC-checked while buffering.
    pub fn open_read(&self, path: &str, lookup: Lookup, buffered: bool) -> Result<FileHandle> {
        self.check_running()?;
        // Held until the handle is registered, so a mod switch either purges
        // it or completes before resolution starts.
        let state = self.state.read();
        let (backing, origin) = match lookup {
            Lookup::Direct => {
                let disk = PathBuf::from(path);
                let backing = local::open_reader(&disk, buffered).map_err(|e| match e.kind() {
                    crate::ErrorKind::NotFound => self.not_found(path),
                    _ => e,
                })?;
                (backing, FileOrigin::Loose(disk))
            }
            Lookup::Layered => {
                let logical = path::normalize(path)?;
                match state.resolve(&logical) {
                    None => return Err(self.not_found(&logical)),
                    Some(Resolved::Loose(disk)) => {
                        (local::open_reader(&disk, buffered)?, FileOrigin::Loose(disk))
                    }
                    Some(Resolved::Archived(pak)) => {
                        let mut reader = pak.open_entry(&logical)?;
                        let origin = FileOrigin::Archived {
                            archive: pak.name().to_string(),
                            entry: logical.clone(),
                        };
                        if buffered {
                            let mut data = Vec::new();
                            reader.read_to_end(&mut data)?;
                            (Backing::Buffered(std::io::Cursor::new(data)), origin)
                        } else {
                            (Backing::Archived(reader), origin)
                        }
                    }
                }
            }
        };

        let origin = if buffered { FileOrigin::Buffered } else { origin };
        let handle = self.register_handle(backing, origin, path);
        drop(state);
        Ok(handle)
    }

    /// Create or truncate a file for writing.
    ///
    /// Layered writes land under the user path, in the active mod's directory
    /// or the base directory; missing parent directories are created.
    pub fn open_write(&self, path: &str, lookup: Lookup) -> Result<FileHandle> {
        self.check_running()?;
        let state = self.state.read();
        let target = match lookup {
            Lookup::Direct => {
                let target = PathBuf::from(path);
                if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                target
            }
            Lookup::Layered => {
                let logical = path::normalize(path)?;
                if logical.is_empty() {
                    return Err(Error::NotFound(path.to_string()));
                }
                let (root, target) = state.write_target(&logical)?;
                local::create_parent_dirs(&root, &target)?;
                target
            }
        };

        debug!(path = %target.display(), "opening for write");
        let backing = local::open_writer(&target)?;
        let handle = self.register_handle(backing, FileOrigin::Loose(target), path);
        drop(state);
        Ok(handle)
    }

    /// Whether a file resolves. Never logs a miss.
    pub fn exists(&self, path: &str, lookup: Lookup) -> bool {
        let _quiet = QuietNotFound::new();
        self.metadata(path, lookup).is_ok()
    }

    /// Size, modification time and origin of a file.
    pub fn metadata(&self, path: &str, lookup: Lookup) -> Result<FileMeta> {
        match lookup {
            Lookup::Direct => {
                let disk = PathBuf::from(path);
                let (size, modified) = local::stat(&disk).ok_or_else(|| self.not_found(path))?;
                Ok(FileMeta {
                    size,
                    modified,
                    origin: FileOrigin::Loose(disk),
                })
            }
            Lookup::Layered => {
                let logical = path::normalize(path)?;
                let resolved = self.state.read().resolve(&logical);
                match resolved {
                    None => Err(self.not_found(&logical)),
                    Some(Resolved::Loose(disk)) => {
                        let (size, modified) =
                            local::stat(&disk).ok_or_else(|| self.not_found(&logical))?;
                        Ok(FileMeta {
                            size,
                            modified,
                            origin: FileOrigin::Loose(disk),
                        })
                    }
                    Some(Resolved::Archived(pak)) => {
                        let entry = pak
                            .entry(&logical)
                            .ok_or_else(|| self.not_found(&logical))?;
                        Ok(FileMeta {
                            size: entry.uncompressed_size(),
                            modified: entry.last_modified(),
                            origin: FileOrigin::Archived {
                                archive: pak.name().to_string(),
                                entry: logical.clone(),
                            },
                        })
                    }
                }
            }
        }
    }

    /// Size of a file in bytes.
    pub fn size(&self, path: &str, lookup: Lookup) -> Result<u64> {
        self.metadata(path, lookup).map(|m| m.size)
    }

    /// Last modification time of a file, if its source records one.
    pub fn mtime(&self, path: &str, lookup: Lookup) -> Result<Option<SystemTime>> {
        self.metadata(path, lookup).map(|m| m.modified)
    }

    /// Read a whole file into a tracked buffer.
    pub fn load(&self, path: &str, lookup: Lookup) -> Result<LoadedFile> {
        self.check_running()?;
        // Same registration rule as `open_read`.
        let state = self.state.read();
        let data = match lookup {
            Lookup::Direct => local::read_all(Path::new(path)).map_err(|e| match e.kind() {
                crate::ErrorKind::NotFound => self.not_found(path),
                _ => e,
            })?,
            Lookup::Layered => {
                let logical = path::normalize(path)?;
                match state.resolve(&logical) {
                    None => return Err(self.not_found(&logical)),
                    Some(Resolved::Loose(disk)) => local::read_all(&disk)?,
                    Some(Resolved::Archived(pak)) => pak.read(&logical)?,
                }
            }
        };

        let id = self.next_id();
        debug!(id, path, len = data.len(), "loaded file");
        let loaded = LoadedFile::register(id, data, path.to_string(), self.housekeeper.sender());
        drop(state);
        Ok(loaded)
    }

    /// List the files and directories below `dir`.
    ///
    /// `ext` filters files by extension, with or without the dot; an empty
    /// string keeps every file. Names are unique ignoring ASCII case and
    /// sorted the same way.
    pub fn list_files(&self, dir: &str, ext: &str, flags: ListFlags) -> Result<Vec<String>> {
        let dir = path::normalize(dir)?;
        let state = self.state.read();
        let mut listing = Listing::new(dir, ext, flags);

        if flags.check_loose {
            for root in state.search_paths.iter().rev() {
                for layer in state.layers().rev() {
                    listing.add_loose(&root.join(layer), |name| state.loose_allowed(name));
                }
            }
        }
        if flags.check_archived {
            for pak in state.archives() {
                listing.add_archive(pak);
            }
        }
        Ok(listing.finish())
    }

    /// Mods available under the search paths.
    pub fn list_mods(&self) -> Vec<ModInfo> {
        let state = self.state.read();
        mods::scan_mods(&state.search_paths, &state.base_dir)
    }

    /// The active mod, if any.
    pub fn active_mod(&self) -> Option<String> {
        self.state.read().active_mod.clone()
    }

    /// Switch the active mod. An empty name, or the base directory's name,
    /// returns to the unmodded game.
    ///
    /// Every open handle is closed and every load buffer freed first. An
    /// unknown mod fails with [`Error::InvalidMod`] and changes nothing.
    pub fn change_mod(&self, name: &str) -> Result<()> {
        self.check_running()?;
        let mut state = self.state.write();

        let target = if name.is_empty() || name.eq_ignore_ascii_case(&state.base_dir) {
            None
        } else {
            let known = mods::scan_mods(&state.search_paths, &state.base_dir);
            let found = known
                .into_iter()
                .find(|m| m.dir == name)
                .ok_or_else(|| Error::InvalidMod(name.to_string()))?;
            Some(found.dir)
        };

        let closed = self.housekeeper.purge();
        if closed.handles > 0 || closed.buffers > 0 {
            info!(
                handles = closed.handles,
                buffers = closed.buffers,
                "closed open files for mod switch"
            );
        }

        let mut mod_paks = Vec::new();
        if let Some(dir) = &target {
            for root in &state.search_paths {
                mod_paks.extend(state.scan_paks(root, dir));
            }
        }
        info!(
            from = state.active_mod.as_deref().unwrap_or(""),
            to = target.as_deref().unwrap_or(""),
            archives = mod_paks.len(),
            "changed mod"
        );
        state.mod_paks = mod_paks;
        state.active_mod = target;
        Ok(())
    }

    /// Turn pure mode on or off. Affects later opens only.
    pub fn set_pure_mode(&self, pure: bool) {
        self.state.write().pure = pure;
    }

    /// Whether pure mode is on.
    pub fn pure_mode(&self) -> bool {
        self.state.read().pure
    }

    /// Allow loose files with this extension in pure mode.
    pub fn add_pure_extension(&self, ext: &str) {
        self.state
            .write()
            .pure_extensions
            .insert(path::normalize_extension(ext));
    }

    /// Stop allowing an extension. Returns whether it was allowed.
    pub fn remove_pure_extension(&self, ext: &str) -> bool {
        self.state
            .write()
            .pure_extensions
            .remove(&path::normalize_extension(ext))
    }

    /// Whether loose files with this extension are readable in pure mode.
    pub fn is_pure_allowed(&self, ext: &str) -> bool {
        self.state
            .read()
            .pure_extensions
            .contains(&path::normalize_extension(ext))
    }

    /// Search paths, lowest precedence first.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.state.read().search_paths.clone()
    }

    /// Resource directories including the active mod, lowest precedence first.
    pub fn resource_dirs(&self) -> Vec<String> {
        self.state.read().layers().map(str::to_string).collect()
    }

    /// Names of the loaded archives, highest precedence first.
    pub fn archive_names(&self) -> Vec<String> {
        self.state
            .read()
            .archives()
            .map(|pak| pak.name().to_string())
            .collect()
    }

    /// Open handles and live buffers known to the housekeeper.
    pub fn tracked(&self) -> Tracked {
        self.housekeeper.tracked()
    }

    /// Stop the housekeeping thread, force-closing whatever is still open.
    ///
    /// Later opens fail with [`Error::Closed`]. Runs on drop if not called.
    pub fn shutdown(&self) -> Tracked {
        self.shut_down.store(true, Ordering::Release);
        self.housekeeper.shutdown()
    }

    fn check_running(&self) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register_handle(&self, backing: Backing, origin: FileOrigin, label: &str) -> FileHandle {
        let id = self.next_id();
        debug!(id, path = label, origin = %origin, "opened file");
        FileHandle::register(
            id,
            backing,
            origin,
            label.to_string(),
            self.housekeeper.sender(),
        )
    }

    fn not_found(&self, path: &str) -> Error {
        if !quiet::is_quiet() {
            warn!(path, "file not found");
        }
        Error::NotFound(path.to_string())
    }
}

impl std::fmt::Debug for Vfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Vfs")
            .field("search_paths", &state.search_paths)
            .field("resource_dirs", &state.resource_dirs)
            .field("active_mod", &state.active_mod)
            .field("archives", &(state.base_paks.len() + state.mod_paks.len()))
            .field("pure", &state.pure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_pak(path: &Path, files: &[(&str, &[u8])]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        fs::write(path, writer.finish().unwrap().into_inner()).unwrap();
    }

    fn write_loose(path: &Path, data: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    fn read_string(vfs: &Vfs, path: &str) -> String {
        let mut handle = vfs.open_read(path, Lookup::Layered, false).unwrap();
        let mut s = String::new();
        handle.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn test_loose_beats_archive_and_later_search_path_wins() {
        let install = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        write_pak(
            &install.path().join("base/pak0.pak"),
            &[("a.txt", b"pak"), ("b.txt", b"pak")],
        );
        write_loose(&install.path().join("base/a.txt"), b"install");
        write_loose(&home.path().join("base/a.txt"), b"home");

        let vfs = Vfs::new(
            VfsConfig::new()
                .search_path(install.path())
                .search_path(home.path()),
        )
        .unwrap();
        assert_eq!(read_string(&vfs, "a.txt"), "home");
        assert_eq!(read_string(&vfs, "b.txt"), "pak");
    }

    #[test]
    fn test_later_archive_wins() {
        let root = TempDir::new().unwrap();
        write_pak(&root.path().join("base/pak0.pak"), &[("a.txt", b"zero")]);
        write_pak(&root.path().join("base/pak1.pak"), &[("a.txt", b"one")]);

        let vfs = Vfs::new(VfsConfig::new().search_path(root.path())).unwrap();
        assert_eq!(vfs.archive_names(), vec!["pak1.pak", "pak0.pak"]);
        assert_eq!(read_string(&vfs, "a.txt"), "one");
    }

    #[test]
    fn test_added_resource_dir_below_mod() {
        let root = TempDir::new().unwrap();
        write_loose(&root.path().join("base/a.txt"), b"base");
        write_loose(&root.path().join("extra/a.txt"), b"extra");
        write_loose(&root.path().join("mymod/a.txt"), b"mod");
        write_loose(&root.path().join("mymod/description.txt"), b"My Mod");

        let vfs = Vfs::new(VfsConfig::new().search_path(root.path())).unwrap();
        vfs.add_resource_dir("extra");
        assert_eq!(read_string(&vfs, "a.txt"), "extra");

        vfs.change_mod("mymod").unwrap();
        assert_eq!(vfs.resource_dirs(), vec!["base", "extra", "mymod"]);
        assert_eq!(read_string(&vfs, "a.txt"), "mod");
    }

    #[test]
    fn test_not_found_and_path_escape() {
        let root = TempDir::new().unwrap();
        let vfs = Vfs::new(VfsConfig::new().search_path(root.path())).unwrap();

        let err = vfs.open_read("missing.txt", Lookup::Layered, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = vfs.open_read("../secret", Lookup::Layered, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Path);
        assert!(!vfs.exists("missing.txt", Lookup::Layered));
    }

    #[test]
    fn test_backslash_paths_resolve() {
        let root = TempDir::new().unwrap();
        write_pak(&root.path().join("base/pak0.pak"), &[("maps/e1m1.bsp", b"bsp")]);
        let vfs = Vfs::new(VfsConfig::new().search_path(root.path())).unwrap();
        assert!(vfs.exists("maps\\e1m1.bsp", Lookup::Layered));
        assert!(vfs.exists("/maps/./e1m1.bsp", Lookup::Layered));
    }

    #[test]
    fn test_direct_lookup_ignores_layers() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("plain.txt");
        write_loose(&file, b"plain");
        let vfs = Vfs::new(VfsConfig::new().search_path(root.path())).unwrap();

        let path = file.to_str().unwrap();
        assert!(vfs.exists(path, Lookup::Direct));
        assert!(!vfs.exists("plain.txt", Lookup::Layered));
        assert_eq!(vfs.size(path, Lookup::Direct).unwrap(), 5);
    }

    #[test]
    fn test_metadata_from_archive() {
        let root = TempDir::new().unwrap();
        write_pak(&root.path().join("base/pak0.pak"), &[("a.txt", b"hello")]);
        let vfs = Vfs::new(VfsConfig::new().search_path(root.path())).unwrap();

        let meta = vfs.metadata("a.txt", Lookup::Layered).unwrap();
        assert_eq!(meta.size, 5);
        assert!(meta.modified.is_some());
        assert_eq!(
            meta.origin,
            FileOrigin::Archived {
                archive: "pak0.pak".into(),
                entry: "a.txt".into()
            }
        );
    }

    #[test]
    fn test_buffered_open_seeks_freely() {
        let root = TempDir::new().unwrap();
        write_pak(&root.path().join("base/pak0.pak"), &[("a.txt", b"hello world")]);
        let vfs = Vfs::new(VfsConfig::new().search_path(root.path())).unwrap();

        let mut handle = vfs.open_read("a.txt", Lookup::Layered, true).unwrap();
        assert_eq!(handle.origin(), &FileOrigin::Buffered);
        assert_eq!(handle.len().unwrap(), 11);
        std::io::Seek::seek(&mut handle, std::io::SeekFrom::End(-5)).unwrap();
        let mut s = String::new();
        handle.read_to_string(&mut s).unwrap();
        assert_eq!(s, "world");
    }

    #[test]
    fn test_buffered_open_with_oversized_claim_fails() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        writer.start_file("a.txt", options).unwrap();
        writer.write_all(b"hello").unwrap();
        let mut data = writer.finish().unwrap().into_inner();

        // Uncompressed size in the local and central headers.
        let claim = 0x7FFF_FFFFu32.to_le_bytes();
        let central = data.windows(4).position(|w| w == b"PK\x01\x02").unwrap();
        data[22..26].copy_from_slice(&claim);
        data[central + 24..central + 28].copy_from_slice(&claim);

        let root = TempDir::new().unwrap();
        write_loose(&root.path().join("base/pak0.pak"), &data);
        let vfs = Vfs::new(VfsConfig::new().search_path(root.path())).unwrap();
        assert_eq!(vfs.size("a.txt", Lookup::Layered).unwrap(), 0x7FFF_FFFF);

        assert!(vfs.open_read("a.txt", Lookup::Layered, true).is_err());
        assert!(vfs.load("a.txt", Lookup::Layered).is_err());
        assert_eq!(vfs.tracked().handles, 0);
        assert_eq!(vfs.tracked().buffers, 0);
    }

    #[test]
    fn test_load_and_free() {
        let root = TempDir::new().unwrap();
        write_loose(&root.path().join("base/cfg/game.cfg"), b"seta x 1");
        let vfs = Vfs::new(VfsConfig::new().search_path(root.path())).unwrap();

        let loaded = vfs.load("cfg/game.cfg", Lookup::Layered).unwrap();
        assert_eq!(loaded.len(), 8);
        assert_eq!(&*loaded.bytes().unwrap(), b"seta x 1");
        assert_eq!(vfs.tracked().buffers, 1);
        loaded.free();
        assert_eq!(vfs.tracked().buffers, 0);
    }

    #[test]
    fn test_write_goes_to_user_path() {
        let install = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let vfs = Vfs::new(
            VfsConfig::new()
                .search_path(install.path())
                .search_path(home.path()),
        )
        .unwrap();

        let mut handle = vfs.open_write("saves/slot0.sav", Lookup::Layered).unwrap();
        handle.write_all(b"progress").unwrap();
        handle.close().unwrap();

        let written = home.path().join("base").join("saves").join("slot0.sav");
        assert_eq!(fs::read(written).unwrap(), b"progress");
        assert_eq!(read_string(&vfs, "saves/slot0.sav"), "progress");
    }

    #[test]
    fn test_write_without_search_path() {
        let vfs = Vfs::new(VfsConfig::new()).unwrap();
        let err = vfs.open_write("a.txt", Lookup::Layered).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Path);
    }

    #[test]
    fn test_write_root_follows_search_paths_added_later() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let vfs = Vfs::new(VfsConfig::new()).unwrap();

        vfs.add_search_path(first.path());
        let mut handle = vfs.open_write("a.txt", Lookup::Layered).unwrap();
        handle.write_all(b"one").unwrap();
        handle.close().unwrap();
        assert_eq!(fs::read(first.path().join("base/a.txt")).unwrap(), b"one");

        vfs.add_search_path(second.path());
        let mut handle = vfs.open_write("a.txt", Lookup::Layered).unwrap();
        handle.write_all(b"two").unwrap();
        handle.close().unwrap();
        assert_eq!(fs::read(second.path().join("base/a.txt")).unwrap(), b"two");
        assert_eq!(read_string(&vfs, "a.txt"), "two");
    }

    #[test]
    fn test_explicit_user_path_wins_over_search_paths() {
        let install = TempDir::new().unwrap();
        let saves = TempDir::new().unwrap();
        let vfs = Vfs::new(
            VfsConfig::new()
                .search_path(install.path())
                .user_path(saves.path()),
        )
        .unwrap();

        let mut handle = vfs.open_write("a.txt", Lookup::Layered).unwrap();
        handle.write_all(b"x").unwrap();
        handle.close().unwrap();
        assert!(saves.path().join("base/a.txt").is_file());
        assert!(!install.path().join("base/a.txt").exists());
    }

    #[test]
    fn test_pure_extension_set() {
        let vfs = Vfs::new(VfsConfig::new().pure_extension(".CFG")).unwrap();
        assert!(vfs.is_pure_allowed("cfg"));
        assert!(vfs.remove_pure_extension("Cfg"));
        assert!(!vfs.is_pure_allowed("cfg"));
        vfs.add_pure_extension("txt");
        assert!(vfs.is_pure_allowed(".txt"));
    }

    #[test]
    fn test_unknown_mod_changes_nothing() {
        let root = TempDir::new().unwrap();
        let vfs = Vfs::new(VfsConfig::new().search_path(root.path())).unwrap();
        let err = vfs.change_mod("nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMod);
        assert_eq!(vfs.active_mod(), None);
    }

    #[test]
    fn test_start_mod_must_exist() {
        let root = TempDir::new().unwrap();
        let config = VfsConfig::new().search_path(root.path()).start_mod("nope");
        let err = Vfs::new(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMod);
    }

    #[test]
    fn test_opens_fail_after_shutdown() {
        let root = TempDir::new().unwrap();
        write_loose(&root.path().join("base/a.txt"), b"a");
        let vfs = Vfs::new(VfsConfig::new().search_path(root.path())).unwrap();

        let mut handle = vfs.open_read("a.txt", Lookup::Layered, false).unwrap();
        let leaked = vfs.shutdown();
        assert_eq!(leaked.handles, 1);
        let err = handle.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(Error::from(err).kind(), ErrorKind::Closed);
        let err = vfs.open_read("a.txt", Lookup::Layered, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
    }
}
