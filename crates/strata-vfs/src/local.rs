//! Plain disk I/O behind loose-file handles.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::handle::Backing;
use crate::{Error, Result};

/// Size and modification time of a file on disk, if it is a regular file.
pub(crate) fn stat(path: &Path) -> Option<(u64, Option<SystemTime>)> {
    let meta = fs::metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    Some((meta.len(), meta.modified().ok()))
}

/// Whether a regular file exists at `path`.
pub(crate) fn is_file(path: &Path) -> bool {
    path.is_file()
}

/// Open a loose file for reading, either streamed or read into memory.
pub(crate) fn open_reader(path: &Path, buffered: bool) -> Result<Backing> {
    let mut file = File::open(path)?;
    if !buffered {
        return Ok(Backing::Local(file));
    }
    let mut data = Vec::with_capacity(file.metadata().map(|m| m.len() as usize).unwrap_or(0));
    file.read_to_end(&mut data)?;
    Ok(Backing::Buffered(Cursor::new(data)))
}

/// Read a whole loose file.
pub(crate) fn read_all(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path)?)
}

/// Create or truncate a file for writing.
pub(crate) fn open_writer(path: &Path) -> Result<Backing> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    Ok(Backing::Writer(BufWriter::new(file)))
}

/// Create the directories between `root` and `target`.
///
/// Refuses targets that are not below `root`, including ones that get there
/// through a symlinked directory.
pub(crate) fn create_parent_dirs(root: &Path, target: &Path) -> Result<()> {
    if !target.starts_with(root) {
        return Err(Error::PathEscape {
            path: target.to_path_buf(),
            root: root.to_path_buf(),
        });
    }
    let Some(parent) = target.parent() else {
        return Ok(());
    };
    if !root.is_dir() {
        fs::create_dir_all(root).map_err(|source| Error::CreateDir {
            path: root.to_path_buf(),
            source,
        })?;
    }
    let canonical_root = canonical(root)?;
    let escape = || Error::PathEscape {
        path: target.to_path_buf(),
        root: root.to_path_buf(),
    };

    // Nothing is created until the deepest existing ancestor is known to be
    // inside the root.
    let existing = parent.ancestors().find(|p| p.exists()).unwrap_or(root);
    if !canonical(existing)?.starts_with(&canonical_root) {
        return Err(escape());
    }

    if !parent.is_dir() {
        debug!(dir = %parent.display(), "creating directory");
        fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    if !canonical(parent)?.starts_with(&canonical_root) {
        return Err(escape());
    }
    Ok(())
}

fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|source| Error::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Turn a logical path into a relative disk path.
pub(crate) fn to_disk(logical: &str) -> PathBuf {
    logical.split('/').collect()
}
