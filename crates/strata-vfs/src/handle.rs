//! Open file handles and whole-file load buffers.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use strata_pak::PakReader;

use crate::housekeeper::{EventSender, FileEvent};
use crate::{Error, Result};

/// The single concrete source behind a handle.
pub(crate) enum Backing {
    /// Streamed loose file.
    Local(File),
    /// Whole file held in memory.
    Buffered(Cursor<Vec<u8>>),
    /// Streamed archive entry.
    Archived(PakReader),
    /// Loose file opened for writing.
    Writer(BufWriter<File>),
}

/// Shared between a handle and the housekeeper; `None` once closed.
pub(crate) type HandleSlot = Mutex<Option<Backing>>;

/// Shared between a load buffer and the housekeeper; `None` once freed.
pub(crate) type BufferSlot = Mutex<Option<Vec<u8>>>;

/// Where an open file's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOrigin {
    /// A file on disk.
    Loose(PathBuf),
    /// An entry inside an archive.
    Archived {
        /// Archive file name.
        archive: String,
        /// Entry name inside the archive.
        entry: String,
    },
    /// An in-memory copy of either of the above.
    Buffered,
}

impl fmt::Display for FileOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOrigin::Loose(path) => write!(f, "{}", path.display()),
            FileOrigin::Archived { archive, entry } => write!(f, "{archive}:{entry}"),
            FileOrigin::Buffered => f.write_str("<memory>"),
        }
    }
}

/// An open file.
///
/// Implements [`Read`], [`Write`] and [`Seek`] over whichever backing it was
/// opened with; operations the backing does not support fail with
/// `Unsupported`. A handle is owned by one caller. When the active mod changes
/// or the filesystem shuts down, the handle is force-closed and every further
/// operation fails with [`Error::Closed`].
pub struct FileHandle {
    id: u64,
    slot: Arc<HandleSlot>,
    origin: FileOrigin,
    events: EventSender,
}

impl FileHandle {
    /// Wrap a backing and announce it to the housekeeper.
    pub(crate) fn register(
        id: u64,
        backing: Backing,
        origin: FileOrigin,
        label: String,
        events: EventSender,
    ) -> Self {
        let slot = Arc::new(Mutex::new(Some(backing)));
        events
            .send(FileEvent::Opened {
                id,
                slot: Arc::downgrade(&slot),
                label,
            })
            .ok();
        Self {
            id,
            slot,
            origin,
            events,
        }
    }

    /// Opaque id, unique per filesystem instance.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Where the bytes come from.
    #[inline]
    pub fn origin(&self) -> &FileOrigin {
        &self.origin
    }

    /// Whether the handle was closed by a mod switch or shutdown.
    pub fn is_closed(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Length of the file in bytes.
    pub fn len(&self) -> Result<u64> {
        let mut guard = self.slot.lock();
        match guard.as_mut().ok_or(Error::Closed)? {
            Backing::Local(file) => Ok(file.metadata()?.len()),
            Backing::Buffered(cursor) => Ok(cursor.get_ref().len() as u64),
            Backing::Archived(reader) => Ok(reader.len()),
            Backing::Writer(writer) => {
                writer.flush()?;
                Ok(writer.get_ref().metadata()?.len())
            }
        }
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Current position, the `tell` of the handle.
    pub fn position(&mut self) -> Result<u64> {
        self.stream_position().map_err(Error::from)
    }

    /// Close the handle, flushing pending writes.
    ///
    /// Closing a handle that was already force-closed succeeds.
    pub fn close(self) -> Result<()> {
        let backing = self.slot.lock().take();
        if let Some(Backing::Writer(mut writer)) = backing {
            writer.flush()?;
        }
        Ok(())
    }

    fn with_backing<T>(&self, f: impl FnOnce(&mut Backing) -> io::Result<T>) -> io::Result<T> {
        let mut guard = self.slot.lock();
        match guard.as_mut() {
            Some(backing) => f(backing),
            None => Err(Error::Closed.into_io()),
        }
    }
}

fn unsupported(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("handle does not support {what}"))
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.with_backing(|backing| match backing {
            Backing::Local(file) => file.read(buf),
            Backing::Buffered(cursor) => cursor.read(buf),
            Backing::Archived(reader) => reader.read(buf),
            Backing::Writer(_) => Err(unsupported("reading")),
        })
    }
}

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_backing(|backing| match backing {
            Backing::Writer(writer) => writer.write(buf),
            _ => Err(unsupported("writing")),
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_backing(|backing| match backing {
            Backing::Writer(writer) => writer.flush(),
            _ => Ok(()),
        })
    }
}

impl Seek for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.with_backing(|backing| match backing {
            Backing::Local(file) => file.seek(pos),
            Backing::Buffered(cursor) => cursor.seek(pos),
            Backing::Archived(reader) => reader.seek(pos),
            Backing::Writer(writer) => writer.seek(pos),
        })
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        self.slot.lock().take();
        self.events.send(FileEvent::Closed { id: self.id }).ok();
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A whole file loaded into memory.
///
/// Freed by [`free`](Self::free) or by dropping it. A mod switch or shutdown
/// frees it early; [`bytes`](Self::bytes) then returns `None`.
pub struct LoadedFile {
    id: u64,
    len: usize,
    data: Arc<BufferSlot>,
    events: EventSender,
}

impl LoadedFile {
    pub(crate) fn register(id: u64, data: Vec<u8>, label: String, events: EventSender) -> Self {
        let len = data.len();
        let data = Arc::new(Mutex::new(Some(data)));
        events
            .send(FileEvent::Loaded {
                id,
                buffer: Arc::downgrade(&data),
                label,
            })
            .ok();
        Self {
            id,
            len,
            data,
            events,
        }
    }

    /// Opaque id, unique per filesystem instance.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Size of the file as loaded.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the file was empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow the contents, unless the buffer was force-freed.
    pub fn bytes(&self) -> Option<MappedMutexGuard<'_, [u8]>> {
        MutexGuard::try_map(self.data.lock(), |data| data.as_deref_mut()).ok()
    }

    /// Whether the buffer was force-freed.
    pub fn is_freed(&self) -> bool {
        self.data.lock().is_none()
    }

    /// Take ownership of the contents.
    pub fn into_vec(self) -> Result<Vec<u8>> {
        self.data.lock().take().ok_or(Error::Closed)
    }

    /// Release the buffer.
    pub fn free(self) {}
}

impl Drop for LoadedFile {
    fn drop(&mut self) {
        self.data.lock().take();
        self.events.send(FileEvent::Freed { id: self.id }).ok();
    }
}

impl fmt::Debug for LoadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedFile")
            .field("id", &self.id)
            .field("len", &self.len)
            .field("freed", &self.is_freed())
            .finish()
    }
}
