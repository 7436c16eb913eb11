//! Per-pair install pipeline and the run loop around it.
//!
//! Each (version, platform) pair runs the stages check, fetch, verify,
//! extract, locate and install in order and ends in a [`PairOutcome`]. A
//! failed or skipped pair never stops the run; the next pair starts from a
//! clean slate. The single exception is a missing archiver for a format with
//! no in-process fallback, which is returned as
//! [`InstallerError::ToolUnavailable`] after cleanup has run.
//!
//! State shared across pairs (the verified-archive cache, the cleanup list
//! and the discovered archiver) lives in [`Pipeline`] for the length of one
//! run.

use crate::cleanup::{ArchivePolicy, CleanupCoordinator, CleanupFailure};
use crate::error::{InstallerError, Result};
use crate::extract::archiver::ArchiveTool;
use crate::extract::{ArchiveExtractor, ExtractionError};
use crate::fetch::Fetcher;
use crate::fetch::download::{ArtefactDownloader, DownloadError};
use crate::install::{destination, install, is_installed, purge};
use crate::locate::locate_root;
use crate::output::{pair_line, summary_line, write_stderr_line};
use crate::platform::PlatformTag;
use crate::registry::VersionRegistry;
use crate::verify::{IntegrityVerifier, VerifyError, VerifyOutcome};
use log::{debug, info};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPolicy {
    /// Root under which `<platform>/<version>` installations live.
    pub install_root: PathBuf,
    /// Where archives are cached and staging directories created.
    pub download_dir: PathBuf,
    /// What happens to archives this run downloads.
    pub archives: ArchivePolicy,
    /// Whether to extract and install, or stop after verification.
    pub extract: bool,
}

impl RunPolicy {
    /// Install everything, discarding downloaded archives afterwards.
    #[must_use]
    pub fn new(install_root: impl Into<PathBuf>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            download_dir: download_dir.into(),
            archives: ArchivePolicy::Discard,
            extract: true,
        }
    }

    /// Apply `archives` to the archives this run downloads.
    #[must_use]
    pub fn with_archives(mut self, archives: ArchivePolicy) -> Self {
        self.archives = archives;
        self
    }

    /// Stop after download and verification. Archives are always kept.
    #[must_use]
    pub fn download_only(mut self) -> Self {
        self.extract = false;
        self.archives = ArchivePolicy::Retain;
        self
    }

    fn staging_dir(&self, pair: Pair) -> PathBuf {
        self.download_dir
            .join(format!("staging-{}-{}", pair.tag, pair.version))
    }
}

/// One (version, platform) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pair {
    /// Release number.
    pub version: u32,
    /// Target platform.
    pub tag: PlatformTag,
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NDK {} ({})", self.version, self.tag)
    }
}

/// Why a pair was skipped without any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The release table has no such version.
    UnknownVersion,
    /// The release does not ship for this platform.
    UnsupportedPlatform,
    /// The entry's URL has no file name to store the archive under.
    MissingFilename,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnknownVersion => "unknown version",
            Self::UnsupportedPlatform => "not available for this platform",
            Self::MissingFilename => "release entry has no archive file name",
        })
    }
}

/// The stage at which a pair was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The download failed.
    Transport,
    /// The archive's digest did not match.
    Integrity,
    /// The archive could not be unpacked.
    Extraction,
    /// No kit root was found in the unpacked tree.
    Structural,
    /// A local file operation failed.
    Filesystem,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transport => "download failed",
            Self::Integrity => "integrity check failed",
            Self::Extraction => "extraction failed",
            Self::Structural => "kit root not found",
            Self::Filesystem => "filesystem error",
        })
    }
}

/// How one pair ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// The kit was installed at `dest`.
    Installed {
        /// The installation directory.
        dest: PathBuf,
    },
    /// A valid installation already existed; nothing was fetched.
    AlreadyInstalled {
        /// The installation directory.
        dest: PathBuf,
    },
    /// The archive was fetched but not extracted.
    Downloaded {
        /// The archive on disk.
        archive: PathBuf,
        /// False when the recorded digest had an unrecognised length.
        verified: bool,
    },
    /// Nothing to do for this pair.
    Skipped(SkipReason),
    /// The pair was aborted.
    Failed {
        /// Which stage failed.
        kind: FailureKind,
        /// Single-line diagnostic.
        message: String,
    },
}

impl PairOutcome {
    fn failed(kind: FailureKind, message: impl fmt::Display) -> Self {
        Self::Failed {
            kind,
            message: message.to_string(),
        }
    }

    /// Whether the pair was aborted.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Tally of outcomes for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pairs installed by this run.
    pub installed: usize,
    /// Pairs that were already installed.
    pub already_installed: usize,
    /// Pairs downloaded without extraction.
    pub downloaded: usize,
    /// Pairs skipped for a configuration miss.
    pub skipped: usize,
    /// Pairs aborted.
    pub failed: usize,
    /// Paths the final cleanup could not remove.
    pub cleanup_failures: usize,
}

impl RunSummary {
    /// Count `outcome`.
    pub fn record(&mut self, outcome: &PairOutcome) {
        match outcome {
            PairOutcome::Installed { .. } => self.installed += 1,
            PairOutcome::AlreadyInstalled { .. } => self.already_installed += 1,
            PairOutcome::Downloaded { .. } => self.downloaded += 1,
            PairOutcome::Skipped(_) => self.skipped += 1,
            PairOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Process exit status: 1 if anything failed, 2 if anything was
    /// skipped, 0 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            1
        } else if self.skipped > 0 {
            2
        } else {
            0
        }
    }
}

/// Runs pairs one at a time, sharing caches between them.
pub struct Pipeline<'a> {
    registry: &'a VersionRegistry,
    policy: &'a RunPolicy,
    fetcher: Fetcher<'a>,
    extractor: ArchiveExtractor<'a>,
    tool_name: &'static str,
    verifier: IntegrityVerifier,
    cleanup: CleanupCoordinator,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline for one run.
    #[must_use]
    pub fn new(
        registry: &'a VersionRegistry,
        policy: &'a RunPolicy,
        downloader: &'a dyn ArtefactDownloader,
        archiver: &'a dyn ArchiveTool,
    ) -> Self {
        Self {
            registry,
            policy,
            fetcher: Fetcher::new(&policy.download_dir, downloader),
            extractor: ArchiveExtractor::new(archiver),
            tool_name: archiver.name(),
            verifier: IntegrityVerifier::new(),
            cleanup: CleanupCoordinator::new(policy.archives),
        }
    }

    /// Process one pair.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ToolUnavailable`] when the archive needs an
    /// archiver the host lacks. Every other problem is a [`PairOutcome`].
    pub fn install_pair(&mut self, pair: Pair) -> Result<PairOutcome> {
        let dest = destination(&self.policy.install_root, pair.tag, pair.version);
        if self.policy.extract && is_installed(&dest) {
            debug!("{pair} already installed at {}", dest.display());
            return Ok(PairOutcome::AlreadyInstalled { dest });
        }

        let Some(release) = self.registry.lookup(pair.version) else {
            return Ok(PairOutcome::Skipped(SkipReason::UnknownVersion));
        };
        let Some(entry) = release.platform(pair.tag) else {
            return Ok(PairOutcome::Skipped(SkipReason::UnsupportedPlatform));
        };
        let Some(filename) = entry.filename() else {
            return Ok(PairOutcome::Skipped(SkipReason::MissingFilename));
        };

        let mut artifact = match self.fetcher.fetch(&entry.url, filename, &mut self.cleanup) {
            Ok(artifact) => artifact,
            Err(err) => return Ok(transport_failure(&err)),
        };
        match self.verifier.verify(&artifact.path, &entry.digest) {
            Ok(VerifyOutcome::Unchecked { .. }) => {}
            Ok(VerifyOutcome::Verified(_) | VerifyOutcome::AlreadyVerified) => {
                artifact.verified = true;
            }
            Err(err @ VerifyError::Mismatch { .. }) => {
                return Ok(PairOutcome::failed(FailureKind::Integrity, err));
            }
            Err(err @ VerifyError::Read { .. }) => {
                return Ok(PairOutcome::failed(FailureKind::Filesystem, err));
            }
        }

        if !self.policy.extract {
            info!("{pair}: kept {}", artifact.path.display());
            return Ok(PairOutcome::Downloaded {
                archive: artifact.path,
                verified: artifact.verified,
            });
        }

        let staging = self.policy.staging_dir(pair);
        if let Err(err) = reset_dir(&staging) {
            return Ok(PairOutcome::failed(FailureKind::Filesystem, err));
        }
        self.cleanup.schedule_staging(staging.clone());

        let depth = match self.extractor.extract(&artifact.path, &staging) {
            Ok(depth) => depth,
            Err(ExtractionError::ToolUnavailable { format }) => {
                return Err(InstallerError::ToolUnavailable {
                    tool: self.tool_name,
                    format,
                });
            }
            Err(err) => return Ok(PairOutcome::failed(FailureKind::Extraction, err)),
        };

        let Some(root) = locate_root(&staging, depth) else {
            return Ok(PairOutcome::failed(
                FailureKind::Structural,
                format!(
                    "no kit root within {depth} levels of {}",
                    artifact.path.display()
                ),
            ));
        };

        if let Err(err) = purge(&dest).and_then(|()| install(&root, &dest)) {
            return Ok(PairOutcome::failed(FailureKind::Filesystem, err));
        }
        Ok(PairOutcome::Installed { dest })
    }

    /// The run's verification cache.
    #[must_use]
    pub fn verifier(&self) -> &IntegrityVerifier {
        &self.verifier
    }

    /// Paths awaiting end-of-run removal.
    pub fn pending_cleanup(&self) -> impl Iterator<Item = &Path> {
        self.cleanup.pending()
    }

    /// Remove staging directories and discarded archives.
    pub fn finish(self) -> Vec<CleanupFailure> {
        self.cleanup.finish()
    }
}

fn transport_failure(err: &DownloadError) -> PairOutcome {
    let kind = match err {
        DownloadError::Io(_) => FailureKind::Filesystem,
        DownloadError::Transfer { .. } | DownloadError::NotFound { .. } => {
            FailureKind::Transport
        }
    };
    PairOutcome::failed(kind, err)
}

fn reset_dir(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    std::fs::create_dir_all(dir)
}

/// Everything a run needs, borrowed from the caller.
pub struct PipelineContext<'a> {
    /// The release table.
    pub registry: &'a VersionRegistry,
    /// Directories and retention settings.
    pub policy: &'a RunPolicy,
    /// Transport for archives.
    pub downloader: &'a dyn ArtefactDownloader,
    /// External archiver.
    pub archiver: &'a dyn ArchiveTool,
    /// Suppress everything except failures.
    pub quiet: bool,
}

/// Process every version on every tag and report each pair to `stderr`.
///
/// Cleanup always runs, including when a missing archiver ends the run
/// early.
///
/// # Errors
///
/// Returns [`InstallerError::ToolUnavailable`] from the pair that needed the
/// missing archiver.
pub fn run_install(
    context: &PipelineContext<'_>,
    versions: &[u32],
    tags: &[PlatformTag],
    stderr: &mut dyn Write,
) -> Result<RunSummary> {
    let mut pipeline = Pipeline::new(
        context.registry,
        context.policy,
        context.downloader,
        context.archiver,
    );
    let mut summary = RunSummary::default();

    for &version in versions {
        for &tag in tags {
            let pair = Pair { version, tag };
            let outcome = match pipeline.install_pair(pair) {
                Ok(outcome) => outcome,
                Err(err) => {
                    report_cleanup(pipeline.finish(), context.quiet, stderr);
                    return Err(err);
                }
            };
            if !context.quiet || outcome.is_failure() {
                write_stderr_line(stderr, pair_line(pair, &outcome));
            }
            summary.record(&outcome);
        }
    }

    summary.cleanup_failures = report_cleanup(pipeline.finish(), context.quiet, stderr);
    if !context.quiet {
        write_stderr_line(stderr, summary_line(&summary));
    }
    Ok(summary)
}

fn report_cleanup(failures: Vec<CleanupFailure>, quiet: bool, stderr: &mut dyn Write) -> usize {
    if !quiet {
        for failure in &failures {
            write_stderr_line(
                stderr,
                format!(
                    "warning: could not remove {}: {}",
                    failure.path.display(),
                    failure.error
                ),
            );
        }
    }
    failures.len()
}

/// What an install run would do for one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPair {
    /// The pair.
    pub pair: Pair,
    /// Where it would be installed.
    pub dest: PathBuf,
    /// The planned action.
    pub action: PlannedAction,
}

/// The action a dry run predicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    /// Fetch `url` and install it.
    Install {
        /// Archive URL.
        url: String,
        /// Whether the archive is already cached locally.
        cached: bool,
    },
    /// Leave the existing installation alone.
    AlreadyInstalled,
    /// Skip the pair.
    Skip(SkipReason),
}

/// Predict the outcome of each pair without touching network or disk.
#[must_use]
pub fn plan_install(
    registry: &VersionRegistry,
    policy: &RunPolicy,
    versions: &[u32],
    tags: &[PlatformTag],
) -> Vec<PlannedPair> {
    let mut plan = Vec::with_capacity(versions.len() * tags.len());
    for &version in versions {
        for &tag in tags {
            let pair = Pair { version, tag };
            let dest = destination(&policy.install_root, tag, version);
            let action = plan_action(registry, policy, pair, &dest);
            plan.push(PlannedPair { pair, dest, action });
        }
    }
    plan
}

fn plan_action(
    registry: &VersionRegistry,
    policy: &RunPolicy,
    pair: Pair,
    dest: &Path,
) -> PlannedAction {
    if policy.extract && is_installed(dest) {
        return PlannedAction::AlreadyInstalled;
    }
    let Some(release) = registry.lookup(pair.version) else {
        return PlannedAction::Skip(SkipReason::UnknownVersion);
    };
    let Some(entry) = release.platform(pair.tag) else {
        return PlannedAction::Skip(SkipReason::UnsupportedPlatform);
    };
    let Some(filename) = entry.filename() else {
        return PlannedAction::Skip(SkipReason::MissingFilename);
    };
    PlannedAction::Install {
        url: entry.url.clone(),
        cached: policy.download_dir.join(filename).is_file(),
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
