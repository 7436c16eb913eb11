//! User-facing lines written to stderr.
//!
//! Every pair produces one line naming the pair and what happened to it, and
//! a run ends with a one-line tally.

use crate::pipeline::{
    FailureKind, Pair, PairOutcome, PlannedAction, PlannedPair, RunSummary, SkipReason,
};
use std::io::Write;

/// Write `message` and a newline to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// The single-line report for one pair.
///
/// # Examples
///
/// ```
/// use ndk_installer::output::pair_line;
/// use ndk_installer::pipeline::{Pair, PairOutcome, SkipReason};
/// use ndk_installer::platform::PlatformTag;
///
/// let pair = Pair { version: 99, tag: PlatformTag::Linux64 };
/// let line = pair_line(pair, &PairOutcome::Skipped(SkipReason::UnknownVersion));
/// assert_eq!(line, "warning: NDK 99 (Linux64): skipped, unknown version");
/// ```
#[must_use]
pub fn pair_line(pair: Pair, outcome: &PairOutcome) -> String {
    match outcome {
        PairOutcome::Installed { dest } => {
            format!("{pair}: installed to {}", dest.display())
        }
        PairOutcome::AlreadyInstalled { dest } => {
            format!("{pair}: already installed at {}", dest.display())
        }
        PairOutcome::Downloaded {
            archive,
            verified: true,
        } => format!("{pair}: downloaded and verified {}", archive.display()),
        PairOutcome::Downloaded {
            archive,
            verified: false,
        } => format!("{pair}: downloaded {} (digest not checked)", archive.display()),
        PairOutcome::Skipped(reason) => skip_line(pair, *reason),
        PairOutcome::Failed { kind, message } => failure_line(pair, *kind, message),
    }
}

fn skip_line(pair: Pair, reason: SkipReason) -> String {
    format!("warning: {pair}: skipped, {reason}")
}

fn failure_line(pair: Pair, kind: FailureKind, message: &str) -> String {
    format!("error: {pair}: {kind}: {message}")
}

/// The end-of-run tally.
#[must_use]
pub fn summary_line(summary: &RunSummary) -> String {
    let mut line = format!(
        "{} installed, {} already installed, {} downloaded, {} skipped, {} failed",
        summary.installed,
        summary.already_installed,
        summary.downloaded,
        summary.skipped,
        summary.failed
    );
    if summary.cleanup_failures > 0 {
        line.push_str(&format!(
            " ({} temporary path(s) left behind)",
            summary.cleanup_failures
        ));
    }
    line
}

/// Lines describing a dry run.
#[must_use]
pub fn plan_text(plan: &[PlannedPair]) -> String {
    let mut lines = vec![
        "Dry run - no files will be downloaded or modified".to_owned(),
        String::new(),
    ];
    for planned in plan {
        let pair = planned.pair;
        let line = match &planned.action {
            PlannedAction::Install { url, cached } => {
                let source = if *cached { "cached" } else { "download" };
                format!(
                    "{pair}: would install to {} ({source} {url})",
                    planned.dest.display()
                )
            }
            PlannedAction::AlreadyInstalled => {
                format!("{pair}: already installed at {}", planned.dest.display())
            }
            PlannedAction::Skip(reason) => skip_line(pair, *reason),
        };
        lines.push(line);
    }
    lines.join("\n")
}
