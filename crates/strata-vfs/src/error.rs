//! Error types for the virtual filesystem.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when resolving, opening or listing files.
#[derive(Debug, Error)]
pub enum Error {
    /// The path is absent from every search path, resource dir and archive.
    #[error("file not found: {0}")]
    NotFound(String),

    /// Archive error.
    #[error("{0}")]
    Pak(#[from] strata_pak::Error),

    /// Path or binary parsing error.
    #[error("{0}")]
    Common(#[from] strata_common::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A parent directory for a write could not be created.
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A write target resolved outside its root.
    #[error("{path} escapes {root}")]
    PathEscape { path: PathBuf, root: PathBuf },

    /// No search path is configured to receive writes.
    #[error("no writable root configured")]
    NoWritableRoot,

    /// The requested mod is not present under any search path.
    #[error("unknown mod: {0}")]
    InvalidMod(String),

    /// The handle or buffer was force-closed by a mod switch or shutdown.
    #[error("file handle was closed")]
    Closed,
}

/// Classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Absent in every source.
    NotFound,
    /// Archive rejected wholesale.
    BadArchive,
    /// One entry's local and central headers disagree, or its data is corrupt.
    CorruptEntry,
    /// Checksum failed at end of stream.
    CrcMismatch,
    /// Seek, read or write failure.
    Io,
    /// Path escape or directory creation failure.
    Path,
    /// Unknown mod name.
    InvalidMod,
    /// Handle already force-closed.
    Closed,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Pak(e) => pak_kind(e),
            Error::Common(strata_common::Error::PathEscape(_)) => ErrorKind::Path,
            Error::Common(_) => ErrorKind::BadArchive,
            Error::Io(e) => io_kind(e),
            Error::CreateDir { .. } | Error::PathEscape { .. } | Error::NoWritableRoot => {
                ErrorKind::Path
            }
            Error::InvalidMod(_) => ErrorKind::InvalidMod,
            Error::Closed => ErrorKind::Closed,
        }
    }

    /// Wrap this error for an `std::io` trait method.
    pub(crate) fn into_io(self) -> io::Error {
        match self {
            Error::Io(e) => e,
            other => {
                let kind = match other.kind() {
                    ErrorKind::NotFound => io::ErrorKind::NotFound,
                    ErrorKind::CrcMismatch | ErrorKind::CorruptEntry | ErrorKind::BadArchive => {
                        io::ErrorKind::InvalidData
                    }
                    _ => io::ErrorKind::Other,
                };
                io::Error::new(kind, other)
            }
        }
    }
}

fn pak_kind(e: &strata_pak::Error) -> ErrorKind {
    match e {
        strata_pak::Error::EntryNotFound(_) => ErrorKind::NotFound,
        strata_pak::Error::CrcMismatch { .. } => ErrorKind::CrcMismatch,
        strata_pak::Error::CorruptEntry { .. } | strata_pak::Error::Decompression(_) => {
            ErrorKind::CorruptEntry
        }
        strata_pak::Error::Io(io) => io_kind(io),
        e if e.is_bad_archive() => ErrorKind::BadArchive,
        _ => ErrorKind::Io,
    }
}

/// Look through an I/O error for an archive or filesystem error it carries.
fn io_kind(e: &io::Error) -> ErrorKind {
    if let Some(inner) = e.get_ref() {
        if let Some(pak) = inner.downcast_ref::<strata_pak::Error>() {
            return pak_kind(pak);
        }
        if let Some(vfs) = inner.downcast_ref::<Error>() {
            return vfs.kind();
        }
    }
    match e.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        _ => ErrorKind::Io,
    }
}

/// Result type for virtual filesystem operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_through_io_wrapper() {
        let crc = strata_pak::Error::CrcMismatch {
            name: "a.txt".into(),
            expected: 1,
            actual: 2,
        };
        let io = io::Error::new(io::ErrorKind::InvalidData, crc);
        assert_eq!(Error::Io(io).kind(), ErrorKind::CrcMismatch);

        let closed = Error::Closed.into_io();
        assert_eq!(Error::Io(closed).kind(), ErrorKind::Closed);
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::Pak(strata_pak::Error::EocdNotFound).kind(),
            ErrorKind::BadArchive
        );
        assert_eq!(
            Error::Pak(strata_pak::Error::CorruptEntry {
                name: "x".into(),
                reason: "test"
            })
            .kind(),
            ErrorKind::CorruptEntry
        );
        assert_eq!(
            Error::Common(strata_common::Error::PathEscape("../x".into())).kind(),
            ErrorKind::Path
        );
    }
}
