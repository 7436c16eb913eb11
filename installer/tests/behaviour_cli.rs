//! End-to-end CLI behaviour tests for `ndk-installer`.
//!
//! These scenarios invoke the installer binary against temporary directories.
//! None of them reaches the network: they stop at the dry run, the release
//! table lookup, or the listing.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliWorld {
    args: RefCell<Vec<String>>,
    output: RefCell<Option<Output>>,
    // Keep the directory alive for the lifetime of the scenario.
    temp_dir: TempDir,
}

#[fixture]
fn cli_world() -> CliWorld {
    CliWorld {
        args: RefCell::new(Vec::new()),
        output: RefCell::new(None),
        temp_dir: TempDir::new().expect("failed to create temp dir"),
    }
}

impl CliWorld {
    fn install_dir(&self) -> PathBuf {
        self.temp_dir.path().join("ndk")
    }

    fn download_dir(&self) -> PathBuf {
        self.temp_dir.path().join("downloads")
    }
}

/// Helper function to retrieve the command output from the CLI world.
fn get_output(cli_world: &CliWorld) -> std::cell::Ref<'_, Output> {
    let output = cli_world.output.borrow();
    std::cell::Ref::map(output, |opt| opt.as_ref().expect("output not set"))
}

#[given("the installer is invoked with \"{args}\"")]
fn given_invocation(cli_world: &CliWorld, args: String) {
    cli_world
        .args
        .replace(args.split_whitespace().map(str::to_owned).collect());
}

#[when("the installer CLI is run")]
fn when_installer_cli_run(cli_world: &CliWorld) {
    let mut args = cli_world.args.borrow().clone();
    args.push("--install-dir".to_owned());
    args.push(cli_world.install_dir().to_string_lossy().into_owned());
    if args.first().map(String::as_str) != Some("list") {
        args.push("--download-dir".to_owned());
        args.push(cli_world.download_dir().to_string_lossy().into_owned());
    }

    let output = Command::new(env!("CARGO_BIN_EXE_ndk-installer"))
        .args(&args)
        .current_dir(cli_world.temp_dir.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run ndk-installer");
    cli_world.output.replace(Some(output));
}

#[then("the CLI exits with status {code}")]
fn then_exit_status(cli_world: &CliWorld, code: i32) {
    let output = get_output(cli_world);
    assert_eq!(
        output.status.code(),
        Some(code),
        "stdout: {}, stderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[then("stderr mentions \"{text}\"")]
fn then_stderr_mentions(cli_world: &CliWorld, text: String) {
    let output = get_output(cli_world);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&text), "expected {text:?} in stderr: {stderr}");
}

#[then("the install directory was not created")]
fn then_install_dir_absent(cli_world: &CliWorld) {
    assert!(!cli_world.install_dir().exists());
    assert!(!cli_world.download_dir().exists());
}

#[then("stdout is a JSON listing of releases")]
fn then_stdout_is_json(cli_world: &CliWorld) {
    let output = get_output(cli_world);
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let releases = value["releases"].as_array().expect("releases array");
    assert!(releases.iter().any(|release| release["version"] == 27));
    assert_eq!(value["installed"].as_array().map(Vec::len), Some(0));
}

// Do not reorder scenarios in tests/features/cli.feature: bindings are
// positional.
#[scenario(path = "tests/features/cli.feature", index = 0)]
fn scenario_dry_run_prints_plan(cli_world: CliWorld) {
    let _ = cli_world;
}

#[scenario(path = "tests/features/cli.feature", index = 1)]
fn scenario_unknown_version_is_skipped(cli_world: CliWorld) {
    let _ = cli_world;
}

#[scenario(path = "tests/features/cli.feature", index = 2)]
fn scenario_list_json(cli_world: CliWorld) {
    let _ = cli_world;
}

#[scenario(path = "tests/features/cli.feature", index = 3)]
fn scenario_missing_registry(cli_world: CliWorld) {
    let _ = cli_world;
}
