//! Archive unpacking into a staging directory.
//!
//! The format is chosen from the file name alone. Plain zip archives go to
//! the external archiver when one is available and to the in-process reader
//! otherwise. Compressed tarballs are unpacked in two passes (decompress,
//! then untar), and disk images and self-extracting executables are opened
//! by the archiver directly. Neither has an in-process fallback, so a missing
//! archiver is reported as [`ExtractionError::ToolUnavailable`], which the
//! pipeline treats as fatal for the whole run.
//!
//! A successful extraction returns a depth hint: how deep below the staging
//! directory the kit root may sit for this format.

pub mod archiver;
pub mod zip_reader;

use archiver::ArchiveTool;
use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

/// Directory inside the staging area that receives the decompressed tar.
const TAR_INTERMEDIATE_DIR: &str = ".decompressed";

/// Archive formats a release may ship in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// `.tar.gz`
    TarGz,
    /// `.tar.xz`
    TarXz,
    /// `.tar.bz2`
    TarBz2,
    /// `.dmg` disk image.
    Dmg,
    /// `.bin` self-extracting archive.
    Bin,
    /// `.exe` self-extracting archive.
    Exe,
}

impl ArchiveFormat {
    const ALL: [Self; 7] = [
        Self::Zip,
        Self::TarGz,
        Self::TarXz,
        Self::TarBz2,
        Self::Dmg,
        Self::Bin,
        Self::Exe,
    ];

    /// Identify the format from a file name suffix, ignoring case.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndk_installer::extract::ArchiveFormat;
    ///
    /// assert_eq!(
    ///     ArchiveFormat::from_filename("android-ndk-r10e-linux-x86_64.bin"),
    ///     Some(ArchiveFormat::Bin)
    /// );
    /// assert_eq!(ArchiveFormat::from_filename("notes.txt"), None);
    /// ```
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| lower.ends_with(format.suffix()))
    }

    /// The file name suffix, including the leading dot.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::TarGz => ".tar.gz",
            Self::TarXz => ".tar.xz",
            Self::TarBz2 => ".tar.bz2",
            Self::Dmg => ".dmg",
            Self::Bin => ".bin",
            Self::Exe => ".exe",
        }
    }

    /// How many levels below the staging directory to search for the root.
    ///
    /// Disk images and self-extractors nest their payload more deeply than
    /// zip and tar archives.
    #[must_use]
    pub const fn depth_hint(self) -> usize {
        match self {
            Self::Dmg | Self::Bin | Self::Exe => 5,
            Self::Zip | Self::TarGz | Self::TarXz | Self::TarBz2 => 3,
        }
    }

    /// Whether the format can be unpacked without an external archiver.
    #[must_use]
    pub const fn in_process_fallback(self) -> bool {
        matches!(self, Self::Zip)
    }

    /// Whether the format is a compressed tarball needing two passes.
    #[must_use]
    pub const fn is_compressed_tar(self) -> bool {
        matches!(self, Self::TarGz | Self::TarXz | Self::TarBz2)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The file name matches no supported archive format.
    #[error("unsupported archive format: {filename}")]
    UnsupportedFormat {
        /// The archive's file name.
        filename: String,
    },

    /// The format needs an external archiver and none is available.
    #[error("no archiver available for {format} archives")]
    ToolUnavailable {
        /// The format that could not be handled.
        format: ArchiveFormat,
    },

    /// The external archiver ran but reported failure.
    #[error("{tool} failed to extract {archive}: {reason}")]
    ToolFailed {
        /// Name of the archiver.
        tool: String,
        /// The archive being extracted.
        archive: PathBuf,
        /// The archiver's last line of diagnostics.
        reason: String,
    },

    /// Decompressing a tarball did not yield a `.tar` member.
    #[error("no tar member found after decompressing {archive}")]
    MissingTarMember {
        /// The compressed archive.
        archive: PathBuf,
    },

    /// A zip entry would be written outside the staging directory.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending entry name.
        path: String,
    },

    /// The zip archive is malformed.
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unpacks archives, choosing a strategy per format.
pub struct ArchiveExtractor<'a> {
    tool: &'a dyn ArchiveTool,
}

impl<'a> ArchiveExtractor<'a> {
    /// Create an extractor that delegates to `tool` where it can.
    #[must_use]
    pub fn new(tool: &'a dyn ArchiveTool) -> Self {
        Self { tool }
    }

    /// Unpack `archive` into `staging` and return the root search depth.
    ///
    /// `staging` is created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::ToolUnavailable`] when the format needs an
    /// archiver the host lacks, and other variants for unreadable or
    /// malformed archives.
    pub fn extract(&self, archive: &Path, staging: &Path) -> Result<usize, ExtractionError> {
        let filename = archive
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let format = ArchiveFormat::from_filename(&filename)
            .ok_or(ExtractionError::UnsupportedFormat { filename })?;

        std::fs::create_dir_all(staging)?;
        let tool_ready = self.tool.supports(format);

        if format.is_compressed_tar() {
            if !tool_ready {
                return Err(ExtractionError::ToolUnavailable { format });
            }
            self.extract_two_stage(archive, staging)?;
        } else if tool_ready {
            debug!("extracting {} with {}", archive.display(), self.tool.name());
            self.tool.extract(archive, staging)?;
        } else if format.in_process_fallback() {
            debug!("extracting {} in process", archive.display());
            zip_reader::extract_zip(archive, staging)?;
        } else {
            return Err(ExtractionError::ToolUnavailable { format });
        }

        Ok(format.depth_hint())
    }

    fn extract_two_stage(&self, archive: &Path, staging: &Path) -> Result<(), ExtractionError> {
        let intermediate = staging.join(TAR_INTERMEDIATE_DIR);
        std::fs::create_dir_all(&intermediate)?;
        debug!("decompressing {} with {}", archive.display(), self.tool.name());
        self.tool.extract(archive, &intermediate)?;

        let tar = find_tar_member(&intermediate)?.ok_or_else(|| {
            ExtractionError::MissingTarMember {
                archive: archive.to_path_buf(),
            }
        })?;
        self.tool.extract(&tar, staging)?;
        std::fs::remove_dir_all(&intermediate)?;
        Ok(())
    }
}

fn find_tar_member(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_tar = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tar"));
        if is_tar && entry.file_type()?.is_file() {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
