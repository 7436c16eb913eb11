//! Directory resolution for platform-specific default paths.
//!
//! Abstracted behind [`BaseDirs`] so tests can supply fixed locations.

use crate::error::{InstallerError, Result};
use camino::Utf8PathBuf;
use directories_next::ProjectDirs;
use std::path::PathBuf;

/// Provides the platform's per-user data and cache locations.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Directory for persistent application data.
    fn data_dir(&self) -> Option<PathBuf>;

    /// Directory for disposable cached files.
    fn cache_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by the `directories-next` crate.
#[derive(Debug, Clone)]
pub struct SystemBaseDirs {
    project: Option<ProjectDirs>,
}

impl SystemBaseDirs {
    /// Resolve the directories for `ndk-installer`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            project: ProjectDirs::from("", "", "ndk-installer"),
        }
    }
}

impl Default for SystemBaseDirs {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseDirs for SystemBaseDirs {
    fn data_dir(&self) -> Option<PathBuf> {
        self.project.as_ref().map(|p| p.data_dir().to_path_buf())
    }

    fn cache_dir(&self) -> Option<PathBuf> {
        self.project.as_ref().map(|p| p.cache_dir().to_path_buf())
    }
}

/// Default root under which kits are installed: `<data_dir>/ndk`.
///
/// # Errors
///
/// Returns an error when the data directory is unknown or not UTF-8.
pub fn default_install_root(dirs: &dyn BaseDirs) -> Result<Utf8PathBuf> {
    let base = utf8_dir(dirs.data_dir(), "install")?;
    Ok(base.join("ndk"))
}

/// Default directory for downloaded archives: `<cache_dir>/downloads`.
///
/// # Errors
///
/// Returns an error when the cache directory is unknown or not UTF-8.
pub fn default_download_dir(dirs: &dyn BaseDirs) -> Result<Utf8PathBuf> {
    let base = utf8_dir(dirs.cache_dir(), "download")?;
    Ok(base.join("downloads"))
}

fn utf8_dir(dir: Option<PathBuf>, purpose: &'static str) -> Result<Utf8PathBuf> {
    let dir = dir.ok_or(InstallerError::DirectoryUnavailable { purpose })?;
    Utf8PathBuf::from_path_buf(dir).map_err(|path| InstallerError::NonUtf8Directory {
        purpose,
        path: path.display().to_string(),
    })
}
