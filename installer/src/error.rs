//! Error types for the NDK installer.
//!
//! Per-stage failures (download, verification, extraction) are recoverable
//! and surface as [`crate::pipeline::PairOutcome`] values. The variants here
//! are the failures that stop a whole invocation: an unreadable release
//! table, an unusable output directory, or a missing external archiver for a
//! format that has no in-process fallback.

use crate::extract::ArchiveFormat;
use crate::registry::RegistryError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that end an installer run.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The release table could not be loaded.
    #[error("failed to load release table: {0}")]
    Registry(#[from] RegistryError),

    /// An archive format needs an external archiver and none was found.
    ///
    /// No in-process extractor exists for these formats, so continuing would
    /// silently skip every remaining pair of the same kind.
    #[error(
        "{format} archives require the {tool} archiver, but it was not found; \
         install 7-Zip (https://www.7-zip.org) and re-run"
    )]
    ToolUnavailable {
        /// Name of the missing tool.
        tool: &'static str,
        /// The archive format that needed it.
        format: ArchiveFormat,
    },

    /// A default directory could not be determined for this platform.
    #[error("could not determine the default {purpose} directory; pass it explicitly")]
    DirectoryUnavailable {
        /// Which directory was being resolved (`install`, `download`).
        purpose: &'static str,
    },

    /// A platform directory is not representable as UTF-8.
    #[error("{purpose} directory is not valid UTF-8: {path}")]
    NonUtf8Directory {
        /// Which directory was being resolved.
        purpose: &'static str,
        /// Lossy rendering of the offending path.
        path: String,
    },

    /// A working directory could not be created.
    #[error("failed to prepare directory {path}: {source}")]
    DirectoryCreate {
        /// The directory that could not be created.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to scan the install root for existing kits.
    #[error("failed to scan install directory: {source}")]
    ScanFailed {
        /// The underlying error that caused the scan to fail.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output.
    #[error("failed to write output: {source}")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
