//! Options for [`Vfs::list_files`](crate::Vfs::list_files).

/// What a listing includes and where it looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFlags {
    /// Descend into subdirectories.
    pub recurse: bool,
    /// Report directories.
    pub include_dirs: bool,
    /// Report files.
    pub include_files: bool,
    /// Scan loose directories.
    pub check_loose: bool,
    /// Scan archive central directories.
    pub check_archived: bool,
    /// Report names relative to the listed directory.
    pub strip_prefix: bool,
}

impl ListFlags {
    /// Direct child files from every source, full logical names.
    pub const FILES: Self = Self {
        recurse: false,
        include_dirs: false,
        include_files: true,
        check_loose: true,
        check_archived: true,
        strip_prefix: false,
    };

    pub const fn recurse(mut self, on: bool) -> Self {
        self.recurse = on;
        self
    }

    pub const fn include_dirs(mut self, on: bool) -> Self {
        self.include_dirs = on;
        self
    }

    pub const fn include_files(mut self, on: bool) -> Self {
        self.include_files = on;
        self
    }

    pub const fn check_loose(mut self, on: bool) -> Self {
        self.check_loose = on;
        self
    }

    pub const fn check_archived(mut self, on: bool) -> Self {
        self.check_archived = on;
        self
    }

    pub const fn strip_prefix(mut self, on: bool) -> Self {
        self.strip_prefix = on;
        self
    }
}

impl Default for ListFlags {
    fn default() -> Self {
        Self::FILES
    }
}
