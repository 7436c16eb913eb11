//! In-process zip extraction, used when no external archiver is present.
//!
//! Entries whose names would land outside the destination, or whose path
//! runs through a symbolic link created earlier in the same archive, are
//! rejected before anything is written. Unix permission bits are restored so kit
//! executables stay executable, and symbolic-link entries are recreated as
//! links on Unix hosts.

use super::ExtractionError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File-type bits of a Unix mode.
const S_IFMT: u32 = 0o170_000;
/// File-type value of a symbolic link.
const S_IFLNK: u32 = 0o120_000;

/// Unpack the zip archive at `archive` into `dest`.
///
/// # Errors
///
/// Returns [`ExtractionError::PathTraversal`] for an entry escaping `dest`,
/// [`ExtractionError::Zip`] for a malformed archive, and
/// [`ExtractionError::Io`] for filesystem failures.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<(), ExtractionError> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(io::BufReader::new(file))?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let target = entry_destination(dest, entry.enclosed_name(), entry.name())?;
        let mode = entry.unix_mode();
        let is_link = mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK);
        reject_linked_path(dest, &target, entry.name(), !is_link)?;

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        if is_link {
            let mut link_target = String::new();
            io::Read::read_to_string(&mut entry, &mut link_target)?;
            write_symlink(&link_target, &target)?;
            continue;
        }

        let mut out = fs::File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        drop(out);
        if let Some(mode) = mode {
            apply_permissions(&target, mode)?;
        }
    }
    Ok(())
}

/// Resolve where an entry goes, rejecting names that escape `dest`.
///
/// `enclosed` is the archive library's sanitised view of the name; it is
/// `None` for absolute paths and names climbing out with `..`.
fn entry_destination(
    dest: &Path,
    enclosed: Option<PathBuf>,
    raw_name: &str,
) -> Result<PathBuf, ExtractionError> {
    let relative = enclosed.ok_or_else(|| ExtractionError::PathTraversal {
        path: raw_name.to_owned(),
    })?;
    Ok(dest.join(relative))
}

/// Refuse to write through a symbolic link already present under `dest`.
///
/// Every existing component between `dest` and `target` must be a real
/// directory. The final component is checked too unless the entry is itself
/// a link, which replaces whatever is there.
fn reject_linked_path(
    dest: &Path,
    target: &Path,
    raw_name: &str,
    check_leaf: bool,
) -> Result<(), ExtractionError> {
    let traversal = || ExtractionError::PathTraversal {
        path: raw_name.to_owned(),
    };
    let relative = target.strip_prefix(dest).map_err(|_| traversal())?;
    let components: Vec<_> = relative.components().collect();
    let checked = if check_leaf {
        components.len()
    } else {
        components.len().saturating_sub(1)
    };

    let mut current = dest.to_path_buf();
    for component in components.iter().take(checked) {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return Err(traversal()),
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

#[cfg(unix)]
fn write_symlink(link_target: &str, path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(_) => fs::remove_file(path)?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    std::os::unix::fs::symlink(link_target, path)
}

#[cfg(not(unix))]
fn write_symlink(link_target: &str, path: &Path) -> io::Result<()> {
    // No unprivileged symlinks; keep the target text so nothing is lost.
    fs::write(path, link_target)
}

#[cfg(unix)]
fn apply_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn apply_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
