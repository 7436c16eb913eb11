//! End-of-run removal of staging directories and downloaded archives.
//!
//! Paths are collected while pairs are processed and removed once, after
//! the last pair. Removal is best effort: failures are returned to the
//! caller, never raised. An interrupted process leaves its paths behind.

use log::debug;
use std::path::{Path, PathBuf};

/// What should happen to archives this run downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePolicy {
    /// Delete freshly downloaded archives at the end of the run.
    Discard,
    /// Keep them in the download directory for later runs.
    Retain,
}

/// Accumulates paths to delete and deletes them in [`Self::finish`].
#[derive(Debug)]
pub struct CleanupCoordinator {
    policy: ArchivePolicy,
    staging: Vec<PathBuf>,
    archives: Vec<PathBuf>,
}

/// A path that could not be removed.
#[derive(Debug)]
pub struct CleanupFailure {
    /// The path that survived.
    pub path: PathBuf,
    /// Why removal failed.
    pub error: std::io::Error,
}

impl CleanupCoordinator {
    /// Create a coordinator applying `policy` to downloaded archives.
    #[must_use]
    pub fn new(policy: ArchivePolicy) -> Self {
        Self {
            policy,
            staging: Vec::new(),
            archives: Vec::new(),
        }
    }

    /// The archive policy in effect.
    #[must_use]
    pub fn policy(&self) -> ArchivePolicy {
        self.policy
    }

    /// Schedule a staging directory for removal. Always honoured.
    pub fn schedule_staging(&mut self, path: PathBuf) {
        if !self.staging.contains(&path) {
            self.staging.push(path);
        }
    }

    /// Schedule an archive this run downloaded, subject to the policy.
    pub fn schedule_archive(&mut self, path: PathBuf) {
        match self.policy {
            ArchivePolicy::Retain => debug!("retaining archive {}", path.display()),
            ArchivePolicy::Discard => {
                if !self.archives.contains(&path) {
                    self.archives.push(path);
                }
            }
        }
    }

    /// Paths currently scheduled, staging directories first.
    pub fn pending(&self) -> impl Iterator<Item = &Path> {
        self.staging
            .iter()
            .chain(self.archives.iter())
            .map(PathBuf::as_path)
    }

    /// Remove every scheduled path and return those that could not be
    /// removed. Paths that no longer exist are not failures.
    pub fn finish(self) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        for path in self.staging.into_iter().chain(self.archives) {
            debug!("removing {}", path.display());
            if let Err(error) = remove_path(&path) {
                failures.push(CleanupFailure { path, error });
            }
        }
        failures
    }
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(error) => Err(error),
    };
    match result {
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
