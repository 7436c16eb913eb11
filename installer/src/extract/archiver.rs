//! External archiver discovery and invocation.
//!
//! [`ArchiveTool`] is the capability seam: it answers whether a format can be
//! handled and performs a single extract-all pass. [`SevenZip`] is the one
//! concrete provider. Its executable is discovered on first use and the
//! result, found or not, is kept for the rest of the run.

use super::{ArchiveFormat, ExtractionError};
use crate::command::{CommandExecutor, command_succeeds, output_excerpt};
use crate::platform::OsFamily;
use log::debug;
use std::cell::OnceCell;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Command names tried, in order of preference.
const COMMAND_NAMES: [&str; 3] = ["7z", "7zz", "7za"];

/// An external program able to unpack archives.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveTool {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this tool is present and can unpack `format`.
    fn supports(&self, format: ArchiveFormat) -> bool;

    /// Unpack everything in `archive` into `dest`, overwriting.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::ToolFailed`] when the tool reports failure
    /// and [`ExtractionError::Io`] when it cannot be started.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractionError>;
}

/// The 7-Zip command-line archiver.
pub struct SevenZip<'a> {
    executor: &'a dyn CommandExecutor,
    os: OsFamily,
    search_path: Option<OsString>,
    program: OnceCell<Option<PathBuf>>,
}

impl<'a> SevenZip<'a> {
    /// Discover 7-Zip on this host when first needed.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self::with_environment(executor, OsFamily::current(), std::env::var_os("PATH"))
    }

    /// Discover 7-Zip as if running on `os` with the given `PATH`.
    #[must_use]
    pub fn with_environment(
        executor: &'a dyn CommandExecutor,
        os: OsFamily,
        search_path: Option<OsString>,
    ) -> Self {
        Self {
            executor,
            os,
            search_path,
            program: OnceCell::new(),
        }
    }

    /// The executable to run, discovering it on first call.
    pub fn program(&self) -> Option<&Path> {
        self.program
            .get_or_init(|| {
                let found = self.discover();
                match &found {
                    Some(path) => debug!("using archiver {}", path.display()),
                    None => debug!("no 7-Zip archiver found"),
                }
                found
            })
            .as_deref()
    }

    fn discover(&self) -> Option<PathBuf> {
        // A bare name the executor can already run beats any path probing.
        let by_name = COMMAND_NAMES
            .into_iter()
            .find(|name| command_succeeds(self.executor, OsStr::new(name), &[]))
            .map(PathBuf::from);
        by_name
            .or_else(|| {
                well_known_paths(&self.os)
                    .into_iter()
                    .find(|candidate| candidate.is_file())
            })
            .or_else(|| self.search_path_lookup())
    }

    fn search_path_lookup(&self) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        let exe_suffix = if self.os == OsFamily::Windows { ".exe" } else { "" };
        std::env::split_paths(search_path).find_map(|dir| {
            COMMAND_NAMES
                .iter()
                .map(|name| dir.join(format!("{name}{exe_suffix}")))
                .find(|candidate| candidate.is_file())
        })
    }
}

impl ArchiveTool for SevenZip<'_> {
    fn name(&self) -> &'static str {
        "7z"
    }

    fn supports(&self, _format: ArchiveFormat) -> bool {
        self.program().is_some()
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractionError> {
        let Some(program) = self.program() else {
            return Err(ExtractionError::ToolFailed {
                tool: self.name().to_owned(),
                archive: archive.to_path_buf(),
                reason: "executable not found".to_owned(),
            });
        };
        let output = self
            .executor
            .run(program.as_os_str(), &extract_args(archive, dest))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ExtractionError::ToolFailed {
                tool: self.name().to_owned(),
                archive: archive.to_path_buf(),
                reason: output_excerpt(&output),
            })
        }
    }
}

/// Arguments for an extract-all pass: keep directory structure, overwrite
/// existing files, answer yes to prompts, store symbolic links as links.
fn extract_args(archive: &Path, dest: &Path) -> Vec<OsString> {
    let mut out_dir = OsString::from("-o");
    out_dir.push(dest.as_os_str());
    vec![
        OsString::from("x"),
        archive.as_os_str().to_owned(),
        out_dir,
        OsString::from("-aoa"),
        OsString::from("-y"),
        OsString::from("-snl"),
    ]
}

fn well_known_paths(os: &OsFamily) -> Vec<PathBuf> {
    let paths: &[&str] = match os {
        OsFamily::Windows => &[
            r"C:\Program Files\7-Zip\7z.exe",
            r"C:\Program Files (x86)\7-Zip\7z.exe",
        ],
        OsFamily::MacOs => &[
            "/opt/homebrew/bin/7zz",
            "/opt/homebrew/bin/7z",
            "/usr/local/bin/7zz",
            "/usr/local/bin/7z",
        ],
        OsFamily::Linux => &[
            "/usr/bin/7z",
            "/usr/bin/7zz",
            "/usr/bin/7za",
            "/usr/local/bin/7z",
            "/snap/bin/7z",
        ],
        OsFamily::Other(_) => &["/usr/local/bin/7z", "/usr/bin/7z"],
    };
    paths.iter().map(PathBuf::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockCommandExecutor;
    use crate::test_utils::{failure_output, success_output};

    fn not_found() -> std::io::Error {
        std::io::Error::from(std::io::ErrorKind::NotFound)
    }

    #[test]
    fn extract_args_match_archiver_contract() {
        let args = extract_args(Path::new("/dl/kit.zip"), Path::new("/stage"));
        assert_eq!(
            args,
            vec![
                OsString::from("x"),
                OsString::from("/dl/kit.zip"),
                OsString::from("-o/stage"),
                OsString::from("-aoa"),
                OsString::from("-y"),
                OsString::from("-snl"),
            ]
        );
    }

    #[test]
    fn prefers_command_resolvable_by_name() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|program, _| program == OsStr::new("7z"))
            .times(1)
            .returning(|_, _| Ok(success_output()));

        let tool = SevenZip::with_environment(&executor, OsFamily::Linux, None);
        assert_eq!(tool.program(), Some(Path::new("7z")));
    }

    #[test]
    fn falls_back_to_later_command_names() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|program, _| program != OsStr::new("7zz"))
            .returning(|_, _| Err(not_found()));
        executor
            .expect_run()
            .withf(|program, _| program == OsStr::new("7zz"))
            .returning(|_, _| Ok(success_output()));

        let tool = SevenZip::with_environment(&executor, OsFamily::MacOs, None);
        assert_eq!(tool.program(), Some(Path::new("7zz")));
    }

    #[test]
    fn walks_search_path_when_names_do_not_resolve() {
        let temp = tempfile::tempdir().expect("temp dir");
        let bin = temp.path().join("bin");
        std::fs::create_dir(&bin).expect("bin dir");
        std::fs::write(bin.join("7za"), b"").expect("fake archiver");

        let mut executor = MockCommandExecutor::new();
        executor.expect_run().returning(|_, _| Err(not_found()));

        let search_path =
            std::env::join_paths([temp.path().join("empty"), bin.clone()]).expect("join paths");
        let tool = SevenZip::with_environment(&executor, OsFamily::Linux, Some(search_path));
        assert_eq!(tool.search_path_lookup(), Some(bin.join("7za")));
    }

    #[test]
    fn search_path_lookup_without_path_finds_nothing() {
        let executor = MockCommandExecutor::new();
        let tool = SevenZip::with_environment(&executor, OsFamily::Linux, None);
        assert_eq!(tool.search_path_lookup(), None);
    }

    #[test]
    fn discovery_runs_once() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .times(1)
            .returning(|_, _| Ok(success_output()));

        let tool = SevenZip::with_environment(&executor, OsFamily::Linux, None);
        assert!(tool.supports(ArchiveFormat::Dmg));
        assert!(tool.supports(ArchiveFormat::Zip));
    }

    #[test]
    fn extract_reports_tool_failure() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|_, args| args.is_empty())
            .returning(|_, _| Ok(success_output()));
        executor
            .expect_run()
            .withf(|_, args| args.first().is_some_and(|arg| arg == "x"))
            .returning(|_, _| Ok(failure_output("ERROR: Can not open the file as archive")));

        let tool = SevenZip::with_environment(&executor, OsFamily::Linux, None);
        let err = tool
            .extract(Path::new("/dl/kit.dmg"), Path::new("/stage"))
            .expect_err("tool fails");
        match err {
            ExtractionError::ToolFailed { reason, .. } => {
                assert_eq!(reason, "ERROR: Can not open the file as archive");
            }
            other => panic!("expected tool failure, got {other:?}"),
        }
    }

    #[test]
    fn extract_passes_contract_arguments() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|_, args| args.is_empty())
            .returning(|_, _| Ok(success_output()));
        executor
            .expect_run()
            .withf(|program, args| {
                program == OsStr::new("7z")
                    && args.len() == 6
                    && args.iter().any(|arg| arg == "-aoa")
                    && args.iter().any(|arg| arg == "-snl")
            })
            .times(1)
            .returning(|_, _| Ok(success_output()));

        let tool = SevenZip::with_environment(&executor, OsFamily::Linux, None);
        tool.extract(Path::new("/dl/kit.zip"), Path::new("/stage"))
            .expect("extract");
    }
}
