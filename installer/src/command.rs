//! External command execution.
//!
//! Host detection and archive extraction shell out to system tools. Routing
//! every invocation through [`CommandExecutor`] lets tests substitute canned
//! output instead of spawning processes.

use std::ffi::{OsStr, OsString};
use std::process::{Command, Output, Stdio};

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs `program` with `args` and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O error encountered while spawning or waiting on the
    /// process. A non-zero exit status is not an error at this layer.
    fn run(&self, program: &OsStr, args: &[OsString]) -> std::io::Result<Output>;
}

/// Executes commands on the host system.
///
/// # Examples
///
/// ```no_run
/// use ndk_installer::command::{CommandExecutor, SystemCommandExecutor};
/// use std::ffi::OsStr;
///
/// let executor = SystemCommandExecutor;
/// let output = executor.run(OsStr::new("7z"), &[])?;
/// assert!(output.status.success());
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, program: &OsStr, args: &[OsString]) -> std::io::Result<Output> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
    }
}

/// Returns true if the given command spawns and exits successfully.
pub(crate) fn command_succeeds(
    executor: &dyn CommandExecutor,
    program: &OsStr,
    args: &[OsString],
) -> bool {
    executor
        .run(program, args)
        .is_ok_and(|output| output.status.success())
}

/// Condenses captured stderr (or stdout when stderr is empty) into one line.
pub(crate) fn output_excerpt(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        stderr
    };
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("no output")
        .to_owned()
}
