//! List command implementation.
//!
//! Shows every release in the table with the platforms it ships for, and
//! every kit installed under the install root. Output goes to stdout, as a
//! table by default or as JSON with `--json`.

use crate::error::{InstallerError, Result};
use crate::install::is_installed;
use crate::platform::PlatformTag;
use crate::registry::VersionRegistry;
use log::trace;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One installed kit found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledKit {
    /// Platform directory it was found under.
    pub platform: PlatformTag,
    /// Release number.
    pub version: u32,
    /// Installation directory.
    pub path: PathBuf,
}

/// Find every valid installation under `install_root`.
///
/// Directories that do not match `<platform>/<version>` or do not hold a
/// valid kit root are ignored. A missing root yields an empty list.
///
/// # Errors
///
/// Returns an I/O error if an existing directory cannot be read.
pub fn scan_installed(install_root: &Path) -> std::io::Result<Vec<InstalledKit>> {
    let mut kits = Vec::new();
    for tag in PlatformTag::ALL {
        let platform_dir = install_root.join(tag.as_str());
        let entries = match std::fs::read_dir(&platform_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        };
        for entry in entries {
            let path = entry?.path();
            let Some(version) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.parse::<u32>().ok())
            else {
                trace!("ignoring {}", path.display());
                continue;
            };
            if is_installed(&path) {
                kits.push(InstalledKit {
                    platform: tag,
                    version,
                    path,
                });
            }
        }
    }
    kits.sort_by_key(|kit| (kit.version, kit.platform));
    Ok(kits)
}

#[derive(Serialize)]
struct ReleaseJson<'a> {
    version: u32,
    label: Option<&'a str>,
    platforms: Vec<PlatformTag>,
}

#[derive(Serialize)]
struct ListJson<'a> {
    install_root: &'a Path,
    releases: Vec<ReleaseJson<'a>>,
    installed: &'a [InstalledKit],
}

/// Render the listing as human-readable text.
#[must_use]
pub fn format_human(
    registry: &VersionRegistry,
    install_root: &Path,
    installed: &[InstalledKit],
) -> String {
    let mut lines = vec!["Available releases:".to_owned()];
    for release in registry.releases() {
        let name = release
            .label()
            .map_or_else(|| format!("r{}", release.version()), str::to_owned);
        let platforms: Vec<&str> = release.platforms().keys().map(|tag| tag.as_str()).collect();
        lines.push(format!(
            "  {:>3}  {name:<8} {}",
            release.version(),
            platforms.join(", ")
        ));
    }

    lines.push(String::new());
    if installed.is_empty() {
        lines.push(format!("No kits installed in {}", install_root.display()));
    } else {
        lines.push(format!("Installed in {}:", install_root.display()));
        for kit in installed {
            lines.push(format!(
                "  {:>3}  {:<12} {}",
                kit.version,
                kit.platform.as_str(),
                kit.path.display()
            ));
        }
    }
    lines.join("\n")
}

/// Render the listing as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialisation fails.
pub fn format_json(
    registry: &VersionRegistry,
    install_root: &Path,
    installed: &[InstalledKit],
) -> serde_json::Result<String> {
    let releases = registry
        .releases()
        .map(|release| ReleaseJson {
            version: release.version(),
            label: release.label(),
            platforms: release.platforms().keys().copied().collect(),
        })
        .collect();
    serde_json::to_string_pretty(&ListJson {
        install_root,
        releases,
        installed,
    })
}

/// Scan `install_root` and write the listing to `stdout`.
///
/// # Errors
///
/// Returns [`InstallerError::ScanFailed`] if the install root cannot be read
/// and [`InstallerError::WriteFailed`] if writing fails.
pub fn run_list(
    registry: &VersionRegistry,
    install_root: &Path,
    json: bool,
    stdout: &mut dyn Write,
) -> Result<()> {
    let installed =
        scan_installed(install_root).map_err(|source| InstallerError::ScanFailed { source })?;
    let output = if json {
        format_json(registry, install_root, &installed).map_err(|err| {
            InstallerError::WriteFailed {
                source: std::io::Error::other(err),
            }
        })?
    } else {
        format_human(registry, install_root, &installed)
    };
    writeln!(stdout, "{output}").map_err(|source| InstallerError::WriteFailed { source })
}
