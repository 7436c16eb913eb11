//! Promoting a located kit root into its final destination.
//!
//! Installations live at `<install_root>/<platform>/<version>/` and hold the
//! kit root's contents directly. A destination that already holds a valid
//! root is the signal that a pair is done; one that exists without a valid
//! root is partial and is emptied before anything new is moved in.

use crate::locate::locate_root;
use crate::platform::PlatformTag;
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Errors arising from installing a kit root.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// A partial destination could not be emptied.
    #[error("cannot clear partial installation at {path}: {source}")]
    Purge {
        /// The destination directory.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An entry could not be moved into the destination.
    #[error("cannot move {from} to {to}: {source}")]
    Move {
        /// The entry in the staging tree.
        from: PathBuf,
        /// Where it was headed.
        to: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// The installation directory for `version` on `tag`.
///
/// # Examples
///
/// ```
/// use ndk_installer::install::destination;
/// use ndk_installer::platform::PlatformTag;
/// use std::path::Path;
///
/// let dest = destination(Path::new("/opt/ndk"), PlatformTag::Win64, 28);
/// assert_eq!(dest, Path::new("/opt/ndk/Win64/28"));
/// ```
#[must_use]
pub fn destination(install_root: &Path, tag: PlatformTag, version: u32) -> PathBuf {
    install_root.join(tag.as_str()).join(version.to_string())
}

/// Whether `dest` already holds a kit root at its top level.
#[must_use]
pub fn is_installed(dest: &Path) -> bool {
    dest.is_dir() && locate_root(dest, 1).is_some_and(|root| root == dest)
}

/// Remove everything inside `dest`, keeping the directory itself.
///
/// # Errors
///
/// Returns [`InstallError::Purge`] if any entry cannot be removed.
pub fn purge(dest: &Path) -> Result<(), InstallError> {
    let purge_error = |source| InstallError::Purge {
        path: dest.to_path_buf(),
        source,
    };
    let entries = match fs::read_dir(dest) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(purge_error(err)),
    };
    for entry in entries {
        let path = entry.map_err(purge_error)?.path();
        remove_any(&path).map_err(purge_error)?;
    }
    Ok(())
}

/// Move every entry directly under `root` into `dest`, overwriting.
///
/// Entries are renamed where possible and copied then deleted when `root`
/// and `dest` are on different filesystems. Returns the number of entries
/// moved.
///
/// # Errors
///
/// Returns [`InstallError::Move`] for the first entry that cannot be moved.
pub fn install(root: &Path, dest: &Path) -> Result<usize, InstallError> {
    let move_error = |from: &Path, to: &Path, source| InstallError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    fs::create_dir_all(dest).map_err(|source| move_error(root, dest, source))?;

    let entries = fs::read_dir(root).map_err(|source| move_error(root, dest, source))?;
    let mut moved = 0;
    for entry in entries {
        let from = entry.map_err(|source| move_error(root, dest, source))?.path();
        let Some(name) = from.file_name() else {
            continue;
        };
        let to = dest.join(name);
        move_entry(&from, &to).map_err(|source| move_error(&from, &to, source))?;
        moved += 1;
    }
    debug!("moved {moved} entries into {}", dest.display());
    Ok(moved)
}

fn move_entry(from: &Path, to: &Path) -> io::Result<()> {
    if fs::symlink_metadata(to).is_ok() {
        remove_any(to)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!(
                "rename {} failed ({err}); copying instead",
                from.display()
            );
            copy_tree(from, to)?;
            remove_any(from)
        }
    }
}

fn remove_any(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Copy a file, link or directory tree, keeping links as links.
fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry.path().strip_prefix(from).map_err(io::Error::other)?;
        let target = if relative.as_os_str().is_empty() {
            to.to_path_buf()
        } else {
            to.join(relative)
        };
        let kind = entry.file_type();
        if kind.is_dir() {
            fs::create_dir_all(&target)?;
        } else if kind.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(from)?, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}
