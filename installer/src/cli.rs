//! CLI argument definitions for the NDK installer.
//!
//! Parsing lives here so the binary stays a thin dispatcher. Running with
//! version numbers and no subcommand is shorthand for `install`.

use crate::cleanup::ArchivePolicy;
use crate::platform::PlatformChoice;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Download, verify, and install Android NDK releases.
#[derive(Parser, Debug)]
#[command(name = "ndk-installer")]
#[command(version, about)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
#[command(long_about = concat!(
    "Download, verify, and install Android NDK releases.\n\n",
    "Each requested release is installed for each target platform into ",
    "<install-dir>/<platform>/<version>/. Releases that are already installed ",
    "are left alone without any network access. Archives are checked against ",
    "the digests in the release table before anything is extracted.\n\n",
    "Without --platform, the platform is detected from the running host.",
))]
#[command(after_help = concat!(
    "PLATFORMS:\n",
    "  Win64, Win32, Linux64, Linux32, MacOSX64, MacOSX32, MacOSXArm64, all\n\n",
    "EXIT STATUS:\n",
    "  0  every requested release is installed\n",
    "  1  a release failed, or the run could not continue\n",
    "  2  nothing failed, but a release or platform was not in the table\n\n",
    "EXAMPLES:\n",
    "  Install r27 for this host:\n",
    "    $ ndk-installer 27\n\n",
    "  Install r26 and r27 for 64-bit Windows and Linux:\n",
    "    $ ndk-installer 26 27 -p Win64 -p Linux64\n\n",
    "  Fetch archives for every platform without extracting:\n",
    "    $ ndk-installer 27 -p all --download-only\n\n",
    "  Show available releases and what is installed:\n",
    "    $ ndk-installer list",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Install arguments (used when no subcommand is given).
    #[command(flatten)]
    pub install: InstallArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Install NDK releases (default when no subcommand given).
    Install(InstallArgs),

    /// List available releases and installed kits.
    List(ListArgs),
}

/// Arguments for the install command.
#[derive(Parser, Debug, Clone, Default)]
pub struct InstallArgs {
    /// Release numbers to install, e.g. 27 for r27.
    #[arg(
        value_name = "VERSION",
        required = true,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub versions: Vec<u32>,

    /// Target platform tag, or `all` (repeatable) [default: this host].
    #[arg(short, long, value_name = "TAG")]
    pub platform: Vec<PlatformChoice>,

    /// Root directory for installations [default: platform-specific].
    #[arg(long, value_name = "DIR")]
    pub install_dir: Option<Utf8PathBuf>,

    /// Directory for downloaded archives [default: platform-specific].
    #[arg(long, value_name = "DIR")]
    pub download_dir: Option<Utf8PathBuf>,

    /// Keep downloaded archives after installing.
    #[arg(long)]
    pub keep_archives: bool,

    /// Download and verify archives without extracting them.
    #[arg(long)]
    pub download_only: bool,

    /// Release table to use instead of the bundled one.
    #[arg(long, value_name = "FILE")]
    pub registry: Option<Utf8PathBuf>,

    /// Show what would be done and exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl InstallArgs {
    /// What to do with archives this run downloads.
    ///
    /// `--download-only` keeps them regardless of `--keep-archives`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndk_installer::cleanup::ArchivePolicy;
    /// use ndk_installer::cli::InstallArgs;
    ///
    /// assert_eq!(InstallArgs::default().archive_policy(), ArchivePolicy::Discard);
    ///
    /// let args = InstallArgs { download_only: true, ..InstallArgs::default() };
    /// assert_eq!(args.archive_policy(), ArchivePolicy::Retain);
    /// ```
    #[must_use]
    pub fn archive_policy(&self) -> ArchivePolicy {
        if self.keep_archives || self.download_only {
            ArchivePolicy::Retain
        } else {
            ArchivePolicy::Discard
        }
    }
}

/// Arguments for the list command.
#[derive(Parser, Debug, Clone, Default)]
pub struct ListArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,

    /// Root directory to scan for installations [default: platform-specific].
    #[arg(long, value_name = "DIR")]
    pub install_dir: Option<Utf8PathBuf>,

    /// Release table to use instead of the bundled one.
    #[arg(long, value_name = "FILE")]
    pub registry: Option<Utf8PathBuf>,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
