//! Shared test utilities for the installer crate.
//!
//! Fixture helpers panic on setup failure; a broken fixture is a broken test.
#![expect(
    clippy::expect_used,
    reason = "fixture setup failures should abort the calling test"
)]

use crate::extract::archiver::ArchiveTool;
use crate::extract::{ExtractionError, zip_reader};
use crate::fetch::download::{ArtefactDownloader, DownloadError};
use crate::locate::{ROOT_SIBLINGS, TOOLCHAINS_DIR};
use sha1::{Digest, Sha1};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(u32::try_from(code).unwrap_or(1))
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Lay out a minimal kit root at `root`.
///
/// The root gets `toolchains`, `sources`, `prebuilt` and `build`
/// directories, each holding one file, plus a `source.properties` file:
/// five top-level entries in all.
pub fn build_kit_tree(root: &Path) {
    let files: [(&str, &[u8]); 4] = [
        (TOOLCHAINS_DIR, b"clang"),
        (ROOT_SIBLINGS[0], b"libc++"),
        (ROOT_SIBLINGS[1], b"python"),
        (ROOT_SIBLINGS[2], b"cmake"),
    ];
    for (dir, contents) in files {
        let dir = root.join(dir);
        std::fs::create_dir_all(&dir).expect("create kit directory");
        std::fs::write(dir.join("README"), contents).expect("write kit file");
    }
    std::fs::write(
        root.join("source.properties"),
        b"Pkg.Desc = Android NDK\nPkg.Revision = 27.2.12479018\n",
    )
    .expect("write source.properties");
}

/// Write a zip archive at `path` holding `entries` as (name, contents).
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).expect("create zip");
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(contents).expect("write zip entry");
    }
    writer.finish().expect("finish zip");
}

/// Build the bytes of a zip archive holding a kit root under `top_dir`.
pub fn kit_zip_bytes(top_dir: &str) -> Vec<u8> {
    let names = [
        format!("{top_dir}/{TOOLCHAINS_DIR}/README"),
        format!("{top_dir}/{}/README", ROOT_SIBLINGS[0]),
        format!("{top_dir}/{}/README", ROOT_SIBLINGS[1]),
        format!("{top_dir}/{}/README", ROOT_SIBLINGS[2]),
        format!("{top_dir}/source.properties"),
    ];
    let cursor = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(cursor);
    let options = zip::write::SimpleFileOptions::default();
    for name in names {
        writer.start_file(name, options).expect("start zip entry");
        writer.write_all(b"kit").expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Lowercase SHA-1 of `bytes`.
pub fn sha1_hex(bytes: &[u8]) -> String {
    Sha1::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// A downloader serving canned bodies and counting transfers.
///
/// URLs without a body answer with [`DownloadError::NotFound`].
#[derive(Debug, Default)]
pub struct StubDownloader {
    bodies: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl StubDownloader {
    /// Create a downloader with no bodies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    #[must_use]
    pub fn with_body(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_owned(), body);
        self
    }

    /// Number of transfers attempted.
    pub fn transfer_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// URLs requested, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl ArtefactDownloader for StubDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        self.requests.borrow_mut().push(url.to_owned());
        let body = self.bodies.get(url).ok_or_else(|| DownloadError::NotFound {
            url: url.to_owned(),
        })?;
        std::fs::write(dest, body)?;
        Ok(())
    }
}

/// An archiver that is present or absent on demand.
///
/// When present it unpacks zip archives in process and answers any other
/// format by laying out a kit root under `payload/kit` in the destination.
#[derive(Debug, Default)]
pub struct StubArchiver {
    available: bool,
    extractions: Cell<usize>,
}

impl StubArchiver {
    /// An archiver that is installed.
    pub fn available() -> Self {
        Self {
            available: true,
            extractions: Cell::new(0),
        }
    }

    /// An archiver that is missing.
    pub fn missing() -> Self {
        Self::default()
    }

    /// Number of extraction passes run.
    pub fn extraction_count(&self) -> usize {
        self.extractions.get()
    }
}

impl ArchiveTool for StubArchiver {
    fn name(&self) -> &'static str {
        "stub-7z"
    }

    fn supports(&self, _format: crate::extract::ArchiveFormat) -> bool {
        self.available
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractionError> {
        self.extractions.set(self.extractions.get() + 1);
        let is_zip = archive
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if is_zip {
            return zip_reader::extract_zip(archive, dest);
        }
        build_kit_tree(&dest.join("payload").join("kit"));
        Ok(())
    }
}
