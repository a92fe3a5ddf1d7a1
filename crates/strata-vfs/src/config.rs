//! Virtual filesystem configuration.

use std::path::PathBuf;

/// Resource directory holding the unmodded game data.
pub const DEFAULT_BASE_DIR: &str = "base";

/// Extension of archives picked up from resource directories.
pub const DEFAULT_PAK_EXTENSION: &str = "pak";

/// File inside a mod directory that names the mod.
pub const MOD_DESCRIPTION_FILE: &str = "description.txt";

/// Startup configuration for a [`Vfs`](crate::Vfs).
///
/// ```
/// use strata_vfs::VfsConfig;
///
/// let config = VfsConfig::new()
///     .search_path("/opt/game")
///     .search_path("/home/player/.game")
///     .pure(true)
///     .pure_extension("cfg");
/// assert_eq!(config.base_dir, "base");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VfsConfig {
    /// Root directories, lowest precedence first.
    pub search_paths: Vec<PathBuf>,
    /// Resource directory always mounted below every search path.
    pub base_dir: String,
    /// Archive extension, without the dot.
    pub pak_extension: String,
    /// Root for writes. Defaults to the last search path.
    pub user_path: Option<PathBuf>,
    /// Start in pure mode.
    pub pure: bool,
    /// Extensions still readable from loose files in pure mode.
    pub pure_extensions: Vec<String>,
    /// Mod to activate at startup.
    pub start_mod: Option<String>,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            base_dir: DEFAULT_BASE_DIR.to_string(),
            pak_extension: DEFAULT_PAK_EXTENSION.to_string(),
            user_path: None,
            pure: false,
            pure_extensions: Vec::new(),
            start_mod: None,
        }
    }
}

impl VfsConfig {
    /// Create a configuration with defaults and no search paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a search path. Later paths take precedence.
    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Set the base resource directory.
    pub fn base_dir(mut self, dir: impl Into<String>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Set the archive extension.
    pub fn pak_extension(mut self, ext: impl Into<String>) -> Self {
        self.pak_extension = ext.into();
        self
    }

    /// Set the write root.
    pub fn user_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_path = Some(path.into());
        self
    }

    /// Enable or disable pure mode.
    pub fn pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    /// Allow loose files with this extension in pure mode.
    pub fn pure_extension(mut self, ext: impl Into<String>) -> Self {
        self.pure_extensions.push(ext.into());
        self
    }

    /// Activate a mod at startup.
    pub fn start_mod(mut self, name: impl Into<String>) -> Self {
        self.start_mod = Some(name.into());
        self
    }
}
