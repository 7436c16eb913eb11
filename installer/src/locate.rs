//! Finding the kit root inside an extracted tree.
//!
//! A kit root is recognised by shape rather than name: it holds a
//! `toolchains` directory next to `sources`, `prebuilt` and `build`
//! directories. Archives wrap the root in one or more directories of varying
//! names, and some carry nested copies of the same layout, so the shallowest
//! match wins.

use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the directory that anchors the search.
pub const TOOLCHAINS_DIR: &str = "toolchains";

/// Directories that must sit beside [`TOOLCHAINS_DIR`] in a kit root.
pub const ROOT_SIBLINGS: [&str; 3] = ["sources", "prebuilt", "build"];

/// Search `search_root` up to `max_depth` levels deep for a kit root.
///
/// Depth counts the `toolchains` directory itself, so a root at
/// `search_root` is found with a depth of 1. Symbolic links are not
/// followed.
///
/// # Examples
///
/// ```
/// use ndk_installer::locate::locate_root;
///
/// let dir = tempfile::tempdir()?;
/// let root = dir.path().join("android-ndk-r27c");
/// for sub in ["toolchains", "sources", "prebuilt", "build"] {
///     std::fs::create_dir_all(root.join(sub))?;
/// }
/// assert_eq!(locate_root(dir.path(), 3), Some(root));
/// assert_eq!(locate_root(dir.path(), 1), None);
/// # Ok::<(), std::io::Error>(())
/// ```
#[must_use]
pub fn locate_root(search_root: &Path, max_depth: usize) -> Option<PathBuf> {
    let found = WalkDir::new(search_root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir() && entry.file_name() == TOOLCHAINS_DIR)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .filter(|parent| is_kit_root(parent))
        .min_by_key(|parent| (parent.components().count(), parent.as_os_str().len()));

    match &found {
        Some(root) => debug!("kit root at {}", root.display()),
        None => debug!(
            "no kit root within {max_depth} levels of {}",
            search_root.display()
        ),
    }
    found
}

/// Whether `dir` has exactly the three required siblings of `toolchains`.
fn is_kit_root(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    let matching = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| ROOT_SIBLINGS.contains(&name))
        })
        .count();
    matching == ROOT_SIBLINGS.len()
}
