//! Mod discovery.
//!
//! A mod is a directory directly below a search path that carries a
//! `description.txt`. The first line of that file is the mod's display name.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::MOD_DESCRIPTION_FILE;

/// A mod directory found under one of the search paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModInfo {
    /// Directory name, as passed to [`Vfs::change_mod`](crate::Vfs::change_mod).
    pub dir: String,
    /// First line of the mod's description file.
    pub description: String,
}

/// Scan every search path for mod directories.
///
/// The base directory is never a mod. A directory present under several
/// search paths is reported once, with the description from the search path
/// registered last. The result is sorted by directory name.
pub(crate) fn scan_mods(search_paths: &[PathBuf], base_dir: &str) -> Vec<ModInfo> {
    let mut found = BTreeMap::new();

    for root in search_paths {
        let Ok(children) = fs::read_dir(root) else {
            continue;
        };
        for child in children.flatten() {
            if !child.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let Some(dir) = child.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if dir.eq_ignore_ascii_case(base_dir) {
                continue;
            }
            if let Some(description) = read_description(&child.path()) {
                debug!(dir = %dir, root = %root.display(), "found mod");
                found.insert(dir.clone(), ModInfo { dir, description });
            }
        }
    }

    found.into_values().collect()
}

fn read_description(dir: &Path) -> Option<String> {
    let text = fs::read(dir.join(MOD_DESCRIPTION_FILE)).ok()?;
    let text = String::from_utf8_lossy(&text);
    let line = text.lines().next().unwrap_or("").trim();
    Some(line.trim_start_matches('\u{feff}').to_string())
}
