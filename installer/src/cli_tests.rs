//! Tests for installer CLI parsing and default behaviours.

use super::*;
use crate::platform::PlatformTag;
use clap::CommandFactory;
use rstest::rstest;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn bare_versions_mean_install() {
    let cli = Cli::parse_from(["ndk-installer", "26", "27"]);
    assert!(cli.command.is_none());
    assert_eq!(cli.install.versions, vec![26, 27]);
    assert!(cli.install.platform.is_empty());
    assert!(cli.install.install_dir.is_none());
    assert!(!cli.install.keep_archives);
    assert!(!cli.install.download_only);
    assert!(!cli.install.dry_run);
    assert_eq!(cli.install.verbosity, 0);
    assert!(!cli.install.quiet);
}

#[test]
fn versions_are_required_for_install() {
    let err = Cli::try_parse_from(["ndk-installer"]).expect_err("versions required");
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}

#[rstest]
#[case::zero("0")]
#[case::negative("-3")]
#[case::word("r27")]
fn invalid_versions_are_rejected(#[case] version: &str) {
    assert!(Cli::try_parse_from(["ndk-installer", "--", version]).is_err());
}

#[test]
fn platforms_are_repeatable_and_case_insensitive() {
    let cli = Cli::parse_from(["ndk-installer", "27", "-p", "win64", "--platform", "Linux64"]);
    assert_eq!(
        cli.install.platform,
        vec![
            PlatformChoice::Tag(PlatformTag::Win64),
            PlatformChoice::Tag(PlatformTag::Linux64),
        ]
    );
}

#[test]
fn platform_all_is_accepted() {
    let cli = Cli::parse_from(["ndk-installer", "27", "-p", "all"]);
    assert_eq!(cli.install.platform, vec![PlatformChoice::All]);
}

#[test]
fn unknown_platform_is_rejected() {
    assert!(Cli::try_parse_from(["ndk-installer", "27", "-p", "Solaris"]).is_err());
}

#[test]
fn directories_and_registry_are_parsed() {
    let cli = Cli::parse_from([
        "ndk-installer",
        "27",
        "--install-dir",
        "/opt/ndk",
        "--download-dir",
        "/tmp/dl",
        "--registry",
        "/etc/ndk/releases.toml",
    ]);
    assert_eq!(cli.install.install_dir, Some(Utf8PathBuf::from("/opt/ndk")));
    assert_eq!(cli.install.download_dir, Some(Utf8PathBuf::from("/tmp/dl")));
    assert_eq!(
        cli.install.registry,
        Some(Utf8PathBuf::from("/etc/ndk/releases.toml"))
    );
}

#[rstest]
#[case::default(&[][..], ArchivePolicy::Discard)]
#[case::keep(&["--keep-archives"][..], ArchivePolicy::Retain)]
#[case::download_only(&["--download-only"][..], ArchivePolicy::Retain)]
fn archive_policy_follows_flags(#[case] flags: &[&str], #[case] expected: ArchivePolicy) {
    let mut argv = vec!["ndk-installer", "27"];
    argv.extend_from_slice(flags);
    let cli = Cli::parse_from(argv);
    assert_eq!(cli.install.archive_policy(), expected);
}

#[test]
fn verbose_and_quiet_conflict() {
    assert!(Cli::try_parse_from(["ndk-installer", "27", "-v", "-q"]).is_err());
}

#[test]
fn verbosity_counts() {
    let cli = Cli::parse_from(["ndk-installer", "27", "-vvv"]);
    assert_eq!(cli.install.verbosity, 3);
}

#[test]
fn install_subcommand_is_explicit_form() {
    let cli = Cli::parse_from(["ndk-installer", "install", "27", "--dry-run"]);
    match cli.command {
        Some(Command::Install(args)) => {
            assert_eq!(args.versions, vec![27]);
            assert!(args.dry_run);
        }
        other => panic!("expected Install command, got {other:?}"),
    }
}

#[test]
fn list_subcommand_needs_no_versions() {
    let cli = Cli::parse_from(["ndk-installer", "list"]);
    assert!(matches!(cli.command, Some(Command::List(_))));
}

#[test]
fn list_parses_json_and_install_dir() {
    let cli = Cli::parse_from(["ndk-installer", "list", "--json", "--install-dir", "/opt/ndk"]);
    match cli.command {
        Some(Command::List(args)) => {
            assert!(args.json);
            assert_eq!(args.install_dir, Some(Utf8PathBuf::from("/opt/ndk")));
        }
        other => panic!("expected List command, got {other:?}"),
    }
}
