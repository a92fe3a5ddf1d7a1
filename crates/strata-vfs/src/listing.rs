//! Directory listings merged across loose directories and archives.

use std::collections::BTreeMap;
use std::path::Path;

use strata_common::path;
use strata_pak::PakArchive;
use walkdir::WalkDir;

use crate::flags::ListFlags;
use crate::local::to_disk;

/// Accumulates one listing. Names are deduplicated ignoring ASCII case; the
/// first source to report a name decides its spelling.
pub(crate) struct Listing {
    dir: String,
    ext: Option<String>,
    flags: ListFlags,
    names: BTreeMap<String, String>,
}

impl Listing {
    /// `dir` must already be normalized. An empty `ext` matches every file.
    pub(crate) fn new(dir: String, ext: &str, flags: ListFlags) -> Self {
        let ext = path::normalize_extension(ext);
        Self {
            dir,
            ext: (!ext.is_empty()).then_some(ext),
            flags,
            names: BTreeMap::new(),
        }
    }

    /// Scan one `<search path>/<resource dir>` root.
    ///
    /// `allow_file` filters loose files by logical name; pure mode uses it to
    /// hide files whose extension is not allow-listed.
    pub(crate) fn add_loose(&mut self, root: &Path, allow_file: impl Fn(&str) -> bool) {
        let base = root.join(to_disk(&self.dir));
        if !base.is_dir() {
            return;
        }
        let max_depth = if self.flags.recurse { usize::MAX } else { 1 };

        for entry in WalkDir::new(&base)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let Ok(relative) = entry.path().strip_prefix(&base) else {
                continue;
            };
            let Some(relative) = logical_name(relative) else {
                continue;
            };
            let file_type = entry.file_type();
            if file_type.is_dir() {
                if self.flags.include_dirs {
                    self.push(&relative);
                }
            } else if self.flags.include_files
                && self.matches_ext(&relative)
                && allow_file(&path::join(&self.dir, &relative))
            {
                self.push(&relative);
            }
        }
    }

    /// Add the matching entries of one archive, including directories implied
    /// by entry names.
    pub(crate) fn add_archive(&mut self, archive: &PakArchive) {
        for entry in archive.entries() {
            let Some(relative) = self.relative(entry.name()) else {
                continue;
            };
            let relative = relative.to_string();

            if self.flags.include_dirs {
                let mut end = 0;
                while let Some(slash) = relative[end..].find('/') {
                    end += slash;
                    self.push(&relative[..end]);
                    if !self.flags.recurse {
                        break;
                    }
                    end += 1;
                }
                if entry.is_dir() && (self.flags.recurse || !relative.contains('/')) {
                    self.push(&relative);
                }
            }

            if entry.is_dir() || !self.flags.include_files {
                continue;
            }
            if !self.flags.recurse && relative.contains('/') {
                continue;
            }
            if self.matches_ext(&relative) {
                self.push(&relative);
            }
        }
    }

    /// Sorted, deduplicated names.
    pub(crate) fn finish(self) -> Vec<String> {
        self.names.into_values().collect()
    }

    fn relative<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.dir.is_empty() {
            return (!name.is_empty()).then_some(name);
        }
        let rest = name.strip_prefix(self.dir.as_str())?.strip_prefix('/')?;
        (!rest.is_empty()).then_some(rest)
    }

    fn matches_ext(&self, name: &str) -> bool {
        match &self.ext {
            None => true,
            Some(ext) => path::extension(name)
                .is_some_and(|e| e.eq_ignore_ascii_case(ext)),
        }
    }

    fn push(&mut self, relative: &str) {
        let name = if self.flags.strip_prefix {
            relative.to_string()
        } else {
            path::join(&self.dir, relative)
        };
        self.names.entry(name.to_ascii_lowercase()).or_insert(name);
    }
}

fn logical_name(relative: &Path) -> Option<String> {
    let mut out = String::new();
    for component in relative.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(component.as_os_str().to_str()?);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(names: &[&str]) -> std::sync::Arc<PakArchive> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for name in names {
            if let Some(dir) = name.strip_suffix('/') {
                writer.add_directory(dir, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                std::io::Write::write_all(&mut writer, b"x").unwrap();
            }
        }
        let data = writer.finish().unwrap().into_inner();
        PakArchive::from_reader("test.pak", Cursor::new(data)).unwrap()
    }

    fn loose(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"x").unwrap();
        }
        dir
    }

    #[test]
    fn test_direct_children_by_extension() {
        let pak = archive(&[
            "textures/a.png",
            "textures/b.PNG",
            "textures/sub/c.png",
            "textures/d.jpg",
        ]);
        let mut listing = Listing::new("textures".into(), ".png", ListFlags::FILES);
        listing.add_archive(&pak);
        assert_eq!(listing.finish(), vec!["textures/a.png", "textures/b.PNG"]);
    }

    #[test]
    fn test_recursive_with_dirs_and_strip_prefix() {
        let pak = archive(&[
            "maps/",
            "maps/e1/",
            "maps/e1/m1.bsp",
            "maps/e2/m1.bsp",
            "sound/x.wav",
        ]);
        let flags = ListFlags::FILES
            .recurse(true)
            .include_dirs(true)
            .strip_prefix(true);
        let mut listing = Listing::new("maps".into(), "", flags);
        listing.add_archive(&pak);
        assert_eq!(listing.finish(), vec!["e1", "e1/m1.bsp", "e2", "e2/m1.bsp"]);
    }

    #[test]
    fn test_implied_dirs_without_recursion() {
        let pak = archive(&["maps/e1/m1.bsp", "maps/e1/m2.bsp", "maps/start.bsp"]);
        let flags = ListFlags::FILES.include_dirs(true).include_files(false);
        let mut listing = Listing::new("maps".into(), "", flags);
        listing.add_archive(&pak);
        assert_eq!(listing.finish(), vec!["maps/e1"]);
    }

    #[test]
    fn test_loose_and_archived_deduplicate_ignoring_case() {
        let dir = loose(&["textures/A.png", "textures/new.png", "textures/deep/x.png"]);
        let pak = archive(&["textures/a.png", "textures/old.png"]);

        let mut listing = Listing::new("textures".into(), "png", ListFlags::FILES);
        listing.add_loose(dir.path(), |_| true);
        listing.add_archive(&pak);
        assert_eq!(
            listing.finish(),
            vec!["textures/A.png", "textures/new.png", "textures/old.png"]
        );
    }

    #[test]
    fn test_loose_filter() {
        let dir = loose(&["cfg/a.cfg", "cfg/b.txt"]);
        let mut listing = Listing::new("cfg".into(), "", ListFlags::FILES);
        listing.add_loose(dir.path(), |name| name.ends_with(".txt"));
        assert_eq!(listing.finish(), vec!["cfg/b.txt"]);
    }

    #[test]
    fn test_root_listing() {
        let pak = archive(&["a.txt", "b/c.txt"]);
        let mut listing = Listing::new(String::new(), "txt", ListFlags::FILES);
        listing.add_archive(&pak);
        assert_eq!(listing.finish(), vec!["a.txt"]);
    }
}
