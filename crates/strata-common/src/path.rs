//! Logical path handling.
//!
//! Logical paths are relative, forward-slash separated and never contain
//! `..`. Archive entry names and resolver lookups are both normalized through
//! [`normalize`] so the two compare byte-for-byte.

use crate::{Error, Result};

/// Normalize a logical path.
///
/// Backslashes become `/`, leading separators are dropped and empty or `.`
/// components are removed. A `..` component is rejected.
///
/// ```
/// use strata_common::path::normalize;
///
/// assert_eq!(normalize("\\textures\\./wall.png").unwrap(), "textures/wall.png");
/// assert!(normalize("../etc/passwd").is_err());
/// ```
pub fn normalize(path: &str) -> Result<String> {
    let mut out = String::with_capacity(path.len());
    for component in path.split(['/', '\\']) {
        match component {
            "" | "." => continue,
            ".." => return Err(Error::PathEscape(path.to_string())),
            part => {
                if !out.is_empty() {
                    out.push('/');
                }
                out.push_str(part);
            }
        }
    }
    Ok(out)
}

/// Extension of the last path component, without the dot.
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx + 1..]),
    }
}

/// Last component of a logical path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Canonical form of an extension for set membership: lowercase, no dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Join a logical directory and a child name.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}
