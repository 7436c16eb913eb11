//! Local archive cache in front of the downloader.
//!
//! An archive is identified by the last segment of its URL. If a file of that
//! name already sits in the download directory it is reused without any
//! transfer, and it is never scheduled for deletion because this run did not
//! create it. New transfers stream into `<name>.part` and are renamed into
//! place only once complete, so an interrupted transfer is never mistaken for
//! a cached archive.

pub mod download;

use crate::cleanup::CleanupCoordinator;
use download::{ArtefactDownloader, DownloadError};
use log::debug;
use std::path::{Path, PathBuf};

/// An archive available on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    /// Where the archive lives.
    pub path: PathBuf,
    /// The URL it came from.
    pub url: String,
    /// Whether this run transferred it.
    pub freshly_downloaded: bool,
    /// Whether its digest has been confirmed this run.
    pub verified: bool,
}

/// Resolves URLs to local files, downloading only what is missing.
pub struct Fetcher<'a> {
    download_dir: &'a Path,
    downloader: &'a dyn ArtefactDownloader,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher storing archives in `download_dir`.
    #[must_use]
    pub fn new(download_dir: &'a Path, downloader: &'a dyn ArtefactDownloader) -> Self {
        Self {
            download_dir,
            downloader,
        }
    }

    /// Where `filename` would be stored.
    #[must_use]
    pub fn local_path(&self, filename: &str) -> PathBuf {
        self.download_dir.join(filename)
    }

    /// Return a local copy of `url`, stored as `filename`.
    ///
    /// Fresh downloads are handed to `cleanup`, which applies the run's
    /// archive policy.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] if the transfer fails or the download
    /// directory cannot be written. A failed transfer leaves no file under
    /// the final name.
    pub fn fetch(
        &self,
        url: &str,
        filename: &str,
        cleanup: &mut CleanupCoordinator,
    ) -> Result<DownloadArtifact, DownloadError> {
        let path = self.local_path(filename);
        if path.is_file() {
            debug!("reusing cached archive {}", path.display());
            return Ok(DownloadArtifact {
                path,
                url: url.to_owned(),
                freshly_downloaded: false,
                verified: false,
            });
        }

        std::fs::create_dir_all(self.download_dir)?;
        let partial = self.local_path(&format!("{filename}.part"));
        if let Err(err) = self.downloader.download(url, &partial) {
            discard_partial(&partial);
            return Err(err);
        }
        if let Err(err) = std::fs::rename(&partial, &path) {
            discard_partial(&partial);
            return Err(DownloadError::Io(err));
        }

        cleanup.schedule_archive(path.clone());
        Ok(DownloadArtifact {
            path,
            url: url.to_owned(),
            freshly_downloaded: true,
            verified: false,
        })
    }
}

fn discard_partial(partial: &Path) {
    if let Err(err) = std::fs::remove_file(partial) {
        if err.kind() != std::io::ErrorKind::NotFound {
            debug!("could not remove {}: {err}", partial.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::ArchivePolicy;
    use download::MockArtefactDownloader;

    const URL: &str = "https://dl.example.test/android-ndk-r27c-linux.zip";
    const NAME: &str = "android-ndk-r27c-linux.zip";

    #[test]
    fn downloads_missing_archive_and_schedules_it() {
        let temp = tempfile::tempdir().expect("temp dir");
        let mut downloader = MockArtefactDownloader::new();
        downloader
            .expect_download()
            .times(1)
            .returning(|_url, dest| std::fs::write(dest, b"payload").map_err(DownloadError::Io));
        let mut cleanup = CleanupCoordinator::new(ArchivePolicy::Discard);

        let fetcher = Fetcher::new(temp.path(), &downloader);
        let artifact = fetcher.fetch(URL, NAME, &mut cleanup).expect("fetch");

        assert!(artifact.freshly_downloaded);
        assert_eq!(artifact.path, temp.path().join(NAME));
        assert_eq!(std::fs::read(&artifact.path).expect("read"), b"payload");
        assert!(!temp.path().join(format!("{NAME}.part")).exists());
        assert_eq!(cleanup.pending().collect::<Vec<_>>(), vec![artifact.path.as_path()]);
    }

    #[test]
    fn existing_archive_is_reused_without_transfer_or_deletion() {
        let temp = tempfile::tempdir().expect("temp dir");
        std::fs::write(temp.path().join(NAME), b"cached").expect("seed cache");
        let mut downloader = MockArtefactDownloader::new();
        downloader.expect_download().never();
        let mut cleanup = CleanupCoordinator::new(ArchivePolicy::Discard);

        let fetcher = Fetcher::new(temp.path(), &downloader);
        let artifact = fetcher.fetch(URL, NAME, &mut cleanup).expect("fetch");

        assert!(!artifact.freshly_downloaded);
        assert_eq!(cleanup.pending().count(), 0);
    }

    #[test]
    fn failed_transfer_leaves_no_file_behind() {
        let temp = tempfile::tempdir().expect("temp dir");
        let mut downloader = MockArtefactDownloader::new();
        downloader.expect_download().returning(|url, dest| {
            std::fs::write(dest, b"half").expect("write partial");
            Err(DownloadError::Transfer {
                url: url.to_owned(),
                reason: "connection reset".to_owned(),
            })
        });
        let mut cleanup = CleanupCoordinator::new(ArchivePolicy::Discard);

        let fetcher = Fetcher::new(temp.path(), &downloader);
        let err = fetcher.fetch(URL, NAME, &mut cleanup).expect_err("transfer fails");

        assert!(matches!(err, DownloadError::Transfer { .. }));
        assert!(!temp.path().join(NAME).exists());
        assert!(!temp.path().join(format!("{NAME}.part")).exists());
        assert_eq!(cleanup.pending().count(), 0);
    }

    #[test]
    fn creates_missing_download_directory() {
        let temp = tempfile::tempdir().expect("temp dir");
        let nested = temp.path().join("cache").join("downloads");
        let mut downloader = MockArtefactDownloader::new();
        downloader
            .expect_download()
            .returning(|_url, dest| std::fs::write(dest, b"x").map_err(DownloadError::Io));
        let mut cleanup = CleanupCoordinator::new(ArchivePolicy::Retain);

        let fetcher = Fetcher::new(&nested, &downloader);
        let artifact = fetcher.fetch(URL, NAME, &mut cleanup).expect("fetch");
        assert!(artifact.path.starts_with(&nested));
    }
}
