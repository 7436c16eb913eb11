//! NDK installer CLI entrypoint.
//!
//! Parses arguments, resolves directories and platforms, then hands the
//! requested releases to the install pipeline or the list command.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::LevelFilter;
use ndk_installer::cli::{Cli, Command, InstallArgs, ListArgs};
use ndk_installer::command::SystemCommandExecutor;
use ndk_installer::dirs::{BaseDirs, SystemBaseDirs, default_download_dir, default_install_root};
use ndk_installer::error::{InstallerError, Result};
use ndk_installer::extract::archiver::SevenZip;
use ndk_installer::fetch::download::HttpDownloader;
use ndk_installer::list::run_list;
use ndk_installer::output::{plan_text, write_stderr_line};
use ndk_installer::pipeline::{PipelineContext, RunPolicy, plan_install, run_install};
use ndk_installer::platform::{HostInfo, resolve_platforms};
use ndk_installer::registry::VersionRegistry;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let (verbosity, quiet) = match &cli.command {
        Some(Command::Install(args)) => (args.verbosity, args.quiet),
        Some(Command::List(_)) => (0, false),
        None => (cli.install.verbosity, cli.install.quiet),
    };
    env_logger::Builder::new()
        .filter_level(log_level(verbosity, quiet))
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<i32> {
    let dirs = SystemBaseDirs::new();
    match &cli.command {
        Some(Command::List(args)) => run_list_command(args, &dirs, stdout).map(|()| 0),
        Some(Command::Install(args)) => run_install_command(args, &dirs, stderr),
        None => run_install_command(&cli.install, &dirs, stderr),
    }
}

/// Maps `-v` occurrences to a log filter; `RUST_LOG` still overrides.
fn log_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn run_install_command(
    args: &InstallArgs,
    dirs: &dyn BaseDirs,
    stderr: &mut dyn Write,
) -> Result<i32> {
    let registry = load_registry(args.registry.as_deref())?;
    let install_root = resolve_dir(args.install_dir.as_deref(), || default_install_root(dirs))?;
    let download_dir = resolve_dir(args.download_dir.as_deref(), || default_download_dir(dirs))?;

    let policy = run_policy(args, &install_root, &download_dir);

    let executor = SystemCommandExecutor;
    let platforms = resolve_platforms(&args.platform, || HostInfo::current(&executor));
    if let Some(warning) = platforms.warning.as_ref().filter(|_| !args.quiet) {
        write_stderr_line(stderr, format!("warning: {warning}"));
    }

    if args.dry_run {
        let plan = plan_install(&registry, &policy, &args.versions, &platforms.tags);
        write_stderr_line(stderr, plan_text(&plan));
        return Ok(0);
    }

    for dir in [&install_root, &download_dir] {
        std::fs::create_dir_all(dir).map_err(|source| InstallerError::DirectoryCreate {
            path: dir.clone(),
            source,
        })?;
    }

    let downloader = HttpDownloader;
    let archiver = SevenZip::new(&executor);
    let context = PipelineContext {
        registry: &registry,
        policy: &policy,
        downloader: &downloader,
        archiver: &archiver,
        quiet: args.quiet,
    };
    let summary = run_install(&context, &args.versions, &platforms.tags, stderr)?;
    Ok(summary.exit_code())
}

fn run_policy(
    args: &InstallArgs,
    install_root: &Utf8Path,
    download_dir: &Utf8Path,
) -> RunPolicy {
    let policy = RunPolicy::new(install_root.as_std_path(), download_dir.as_std_path())
        .with_archives(args.archive_policy());
    if args.download_only {
        policy.download_only()
    } else {
        policy
    }
}

fn run_list_command(args: &ListArgs, dirs: &dyn BaseDirs, stdout: &mut dyn Write) -> Result<()> {
    let registry = load_registry(args.registry.as_deref())?;
    let install_root = resolve_dir(args.install_dir.as_deref(), || default_install_root(dirs))?;
    run_list(&registry, install_root.as_std_path(), args.json, stdout)
}

fn load_registry(path: Option<&Utf8Path>) -> Result<VersionRegistry> {
    let registry = match path {
        Some(path) => VersionRegistry::from_file(path)?,
        None => VersionRegistry::bundled()?,
    };
    Ok(registry)
}

/// Use the explicit directory when given, otherwise the platform default.
fn resolve_dir(
    explicit: Option<&Utf8Path>,
    default: impl FnOnce() -> Result<Utf8PathBuf>,
) -> Result<Utf8PathBuf> {
    explicit.map_or_else(default, |dir| Ok(dir.to_owned()))
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}
