//! Platform tags and host detection.
//!
//! Every release in the table and every installation directory is keyed by
//! one of seven fixed [`PlatformTag`]s. When the user does not name one, the
//! host operating system and CPU architecture pick it.

use crate::command::CommandExecutor;
use serde::Serialize;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::str::FromStr;

/// First Windows build with x64 emulation on ARM64 (Windows 11).
const WINDOWS_ARM64_X64_EMULATION_BUILD: u32 = 22_000;

/// A fixed (OS, word width, architecture) label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PlatformTag {
    /// 64-bit Windows.
    Win64,
    /// 32-bit Windows.
    Win32,
    /// 64-bit Linux.
    Linux64,
    /// 32-bit Linux.
    Linux32,
    /// 64-bit Intel macOS.
    MacOSX64,
    /// 32-bit Intel macOS.
    MacOSX32,
    /// 64-bit ARM macOS.
    MacOSXArm64,
}

impl PlatformTag {
    /// Every known tag, in display order.
    pub const ALL: [Self; 7] = [
        Self::Win64,
        Self::Win32,
        Self::Linux64,
        Self::Linux32,
        Self::MacOSX64,
        Self::MacOSX32,
        Self::MacOSXArm64,
    ];

    /// The tag's canonical name, also used as a directory name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Win64 => "Win64",
            Self::Win32 => "Win32",
            Self::Linux64 => "Linux64",
            Self::Linux32 => "Linux32",
            Self::MacOSX64 => "MacOSX64",
            Self::MacOSX32 => "MacOSX32",
            Self::MacOSXArm64 => "MacOSXArm64",
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known platform tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform \"{value}\"; expected one of: {expected}")]
pub struct UnknownPlatform {
    /// The rejected input.
    pub value: String,
    /// Comma-separated list of accepted tags.
    pub expected: String,
}

impl FromStr for PlatformTag {
    type Err = UnknownPlatform;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnknownPlatform {
                value: value.to_owned(),
                expected: Self::ALL.map(Self::as_str).join(", "),
            })
    }
}

/// One `--platform` argument: a specific tag or every tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformChoice {
    /// Every known tag.
    All,
    /// Exactly this tag.
    Tag(PlatformTag),
}

impl FromStr for PlatformChoice {
    type Err = UnknownPlatform;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        value.parse().map(Self::Tag)
    }
}

/// Operating system families the installer distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsFamily {
    /// Microsoft Windows.
    Windows,
    /// Linux.
    Linux,
    /// Apple macOS.
    MacOs,
    /// Anything else, by `std::env::consts::OS` name.
    Other(String),
}

impl OsFamily {
    /// The family this binary was built for.
    #[must_use]
    pub fn current() -> Self {
        Self::from_consts(std::env::consts::OS)
    }

    fn from_consts(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "linux" => Self::Linux,
            "macos" => Self::MacOs,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// What detection knows about the running machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// Operating system family.
    pub os: OsFamily,
    /// CPU architecture, as `std::env::consts::ARCH` spells it.
    pub arch: String,
    /// Windows build number, when known.
    pub windows_build: Option<u32>,
}

impl HostInfo {
    /// Describe the current process's host.
    ///
    /// The Windows build number is read from `cmd /c ver`; failures leave it
    /// unknown.
    pub fn current(executor: &dyn CommandExecutor) -> Self {
        let os = OsFamily::current();
        let windows_build = match os {
            OsFamily::Windows => query_windows_build(executor),
            _ => None,
        };
        Self {
            os,
            arch: std::env::consts::ARCH.to_owned(),
            windows_build,
        }
    }
}

/// Tags chosen by host detection, plus a warning when detection gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResolution {
    /// Tags to process.
    pub tags: Vec<PlatformTag>,
    /// Set when the host could not be mapped and every tag was returned.
    pub warning: Option<String>,
}

/// Map a host description to platform tags.
///
/// 64-bit capable architectures map to the OS family's 64-bit tag, with one
/// exception: Windows on ARM64 before build 22000 has no x64 emulation, so it
/// gets `Win32`. An unknown build number is treated the same way. Hosts that
/// cannot be mapped yield every tag and a warning.
#[must_use]
pub fn resolve_host(host: &HostInfo) -> HostResolution {
    let tag = match (&host.os, host.arch.as_str()) {
        (OsFamily::Windows, "x86_64") => Some(PlatformTag::Win64),
        (OsFamily::Windows, "aarch64") => Some(windows_arm64_tag(host.windows_build)),
        (OsFamily::Windows, "x86") => Some(PlatformTag::Win32),
        (OsFamily::Linux, "x86_64" | "aarch64") => Some(PlatformTag::Linux64),
        (OsFamily::Linux, "x86") => Some(PlatformTag::Linux32),
        (OsFamily::MacOs, "x86_64") => Some(PlatformTag::MacOSX64),
        (OsFamily::MacOs, "aarch64") => Some(PlatformTag::MacOSXArm64),
        (OsFamily::MacOs, "x86") => Some(PlatformTag::MacOSX32),
        _ => None,
    };

    match tag {
        Some(tag) => HostResolution {
            tags: vec![tag],
            warning: None,
        },
        None => HostResolution {
            tags: PlatformTag::ALL.to_vec(),
            warning: Some(format!(
                "could not determine a platform for {:?}/{}; trying every platform",
                host.os, host.arch
            )),
        },
    }
}

fn windows_arm64_tag(build: Option<u32>) -> PlatformTag {
    match build {
        Some(build) if build >= WINDOWS_ARM64_X64_EMULATION_BUILD => PlatformTag::Win64,
        _ => PlatformTag::Win32,
    }
}

/// Resolve the tags for this run.
///
/// Explicit choices bypass detection entirely and are never downgraded. Any
/// `all` choice wins over individual tags. With no choices, `detect` is
/// consulted.
pub fn resolve_platforms(
    choices: &[PlatformChoice],
    detect: impl FnOnce() -> HostInfo,
) -> HostResolution {
    if choices.is_empty() {
        return resolve_host(&detect());
    }
    if choices.contains(&PlatformChoice::All) {
        return HostResolution {
            tags: PlatformTag::ALL.to_vec(),
            warning: None,
        };
    }

    let mut tags = Vec::new();
    for choice in choices {
        if let PlatformChoice::Tag(tag) = choice {
            if !tags.contains(tag) {
                tags.push(*tag);
            }
        }
    }
    HostResolution {
        tags,
        warning: None,
    }
}

fn query_windows_build(executor: &dyn CommandExecutor) -> Option<u32> {
    let args = [OsString::from("/c"), OsString::from("ver")];
    let output = executor.run(OsStr::new("cmd"), &args).ok()?;
    if !output.status.success() {
        return None;
    }
    parse_windows_build(&String::from_utf8_lossy(&output.stdout))
}

/// Extract the build number from `ver` output such as
/// `Microsoft Windows [Version 10.0.22631.4317]`.
fn parse_windows_build(ver_output: &str) -> Option<u32> {
    let start = ver_output.find("Version ")? + "Version ".len();
    let version = ver_output.get(start..)?;
    let version = version.split(']').next()?.trim();
    version.split('.').nth(2)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockCommandExecutor;
    use crate::test_utils::{failure_output, success_output};
    use rstest::rstest;

    fn host(os: OsFamily, arch: &str, windows_build: Option<u32>) -> HostInfo {
        HostInfo {
            os,
            arch: arch.to_owned(),
            windows_build,
        }
    }

    #[rstest]
    #[case::win_x64(OsFamily::Windows, "x86_64", None, PlatformTag::Win64)]
    #[case::win_x86(OsFamily::Windows, "x86", None, PlatformTag::Win32)]
    #[case::win11_arm(OsFamily::Windows, "aarch64", Some(22631), PlatformTag::Win64)]
    #[case::win10_arm(OsFamily::Windows, "aarch64", Some(19045), PlatformTag::Win32)]
    #[case::win_arm_unknown_build(OsFamily::Windows, "aarch64", None, PlatformTag::Win32)]
    #[case::linux_x64(OsFamily::Linux, "x86_64", None, PlatformTag::Linux64)]
    #[case::linux_arm64(OsFamily::Linux, "aarch64", None, PlatformTag::Linux64)]
    #[case::linux_x86(OsFamily::Linux, "x86", None, PlatformTag::Linux32)]
    #[case::mac_intel(OsFamily::MacOs, "x86_64", None, PlatformTag::MacOSX64)]
    #[case::mac_arm(OsFamily::MacOs, "aarch64", None, PlatformTag::MacOSXArm64)]
    #[case::mac_x86(OsFamily::MacOs, "x86", None, PlatformTag::MacOSX32)]
    fn resolve_host_maps_known_hosts(
        #[case] os: OsFamily,
        #[case] arch: &str,
        #[case] build: Option<u32>,
        #[case] expected: PlatformTag,
    ) {
        let resolution = resolve_host(&host(os, arch, build));
        assert_eq!(resolution.tags, vec![expected]);
        assert!(resolution.warning.is_none());
    }

    #[rstest]
    #[case::unknown_arch(OsFamily::Linux, "riscv64")]
    #[case::unknown_os(OsFamily::Other("freebsd".to_owned()), "x86_64")]
    fn resolve_host_falls_back_to_every_tag(#[case] os: OsFamily, #[case] arch: &str) {
        let resolution = resolve_host(&host(os, arch, None));
        assert_eq!(resolution.tags, PlatformTag::ALL.to_vec());
        assert!(resolution.warning.is_some());
    }

    #[test]
    fn explicit_tag_bypasses_detection_and_is_not_downgraded() {
        let resolution = resolve_platforms(&[PlatformChoice::Tag(PlatformTag::Win64)], || {
            panic!("detection must not run for explicit choices")
        });
        assert_eq!(resolution.tags, vec![PlatformTag::Win64]);
    }

    #[test]
    fn all_choice_wins_over_individual_tags() {
        let choices = [
            PlatformChoice::Tag(PlatformTag::Linux64),
            PlatformChoice::All,
        ];
        let resolution = resolve_platforms(&choices, || panic!("no detection"));
        assert_eq!(resolution.tags.len(), PlatformTag::ALL.len());
    }

    #[test]
    fn repeated_tags_are_deduplicated_in_order() {
        let choices = [
            PlatformChoice::Tag(PlatformTag::MacOSXArm64),
            PlatformChoice::Tag(PlatformTag::MacOSX64),
            PlatformChoice::Tag(PlatformTag::MacOSXArm64),
        ];
        let resolution = resolve_platforms(&choices, || panic!("no detection"));
        assert_eq!(
            resolution.tags,
            vec![PlatformTag::MacOSXArm64, PlatformTag::MacOSX64]
        );
    }

    #[test]
    fn no_choice_uses_detection() {
        let resolution = resolve_platforms(&[], || host(OsFamily::Linux, "x86_64", None));
        assert_eq!(resolution.tags, vec![PlatformTag::Linux64]);
    }

    #[rstest]
    #[case::exact("Win64", PlatformTag::Win64)]
    #[case::lowercase("macosxarm64", PlatformTag::MacOSXArm64)]
    #[case::mixed("linux32", PlatformTag::Linux32)]
    fn platform_tag_parses_case_insensitively(#[case] input: &str, #[case] expected: PlatformTag) {
        assert_eq!(input.parse::<PlatformTag>(), Ok(expected));
    }

    #[test]
    fn platform_tag_rejects_unknown_names() {
        let err = "Solaris64".parse::<PlatformTag>().expect_err("unknown tag");
        assert!(err.to_string().contains("Win64"));
    }

    #[test]
    fn platform_choice_accepts_all() {
        assert_eq!("ALL".parse::<PlatformChoice>(), Ok(PlatformChoice::All));
    }

    #[rstest]
    #[case::win11("\r\nMicrosoft Windows [Version 10.0.22631.4317]\r\n", Some(22631))]
    #[case::win10("Microsoft Windows [Version 10.0.19045.3803]", Some(19045))]
    #[case::garbage("not a version string", None)]
    fn parse_windows_build_reads_third_component(
        #[case] output: &str,
        #[case] expected: Option<u32>,
    ) {
        assert_eq!(parse_windows_build(output), expected);
    }

    #[test]
    fn query_windows_build_parses_ver_output() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_run().returning(|_, _| {
            let mut output = success_output();
            output.stdout = b"Microsoft Windows [Version 10.0.26100.1]".to_vec();
            Ok(output)
        });
        assert_eq!(query_windows_build(&executor), Some(26100));
    }

    #[test]
    fn query_windows_build_ignores_failed_command() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .returning(|_, _| Ok(failure_output("nope")));
        assert_eq!(query_windows_build(&executor), None);
    }
}
