//! HTTP transfer of release archives.
//!
//! Provides a trait-based abstraction over the transport so that the
//! pipeline can be exercised without network access.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Time allowed to establish a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Time allowed for the server to start responding. The body itself is not
/// time-limited; kit archives run to hundreds of megabytes.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

/// Trait for transferring a URL into a local file.
///
/// # Examples
///
/// ```no_run
/// use ndk_installer::fetch::download::{ArtefactDownloader, HttpDownloader};
/// use std::path::Path;
///
/// HttpDownloader.download(
///     "https://dl.google.com/android/repository/android-ndk-r27c-linux.zip",
///     Path::new("/tmp/android-ndk-r27c-linux.zip"),
/// )?;
/// # Ok::<(), ndk_installer::fetch::download::DownloadError>(())
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Download `url` and write the body to `dest`, blocking until done.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the file cannot be written.
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Why a transfer did not produce a file.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The request failed or the body was cut short.
    #[error("transfer of {url} failed: {reason}")]
    Transfer {
        /// Requested URL.
        url: String,
        /// Transport or status description.
        reason: String,
    },

    /// The server answered 404.
    #[error("no archive at {url} (HTTP 404)")]
    NotFound {
        /// Requested URL.
        url: String,
    },

    /// The body could not be written locally.
    #[error("could not write archive: {0}")]
    Io(#[from] std::io::Error),
}

/// Blocking downloader over a shared `ureq` agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpDownloader;

impl ArtefactDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let response = http_agent()
            .get(url)
            .call()
            .map_err(|err| classify(url, &err))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file).map_err(|err| {
            DownloadError::Transfer {
                url: url.to_owned(),
                reason: err.to_string(),
            }
        })?;
        file.sync_all()?;
        Ok(())
    }
}

fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .timeout_recv_response(Some(RESPONSE_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

fn classify(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::Transfer {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
