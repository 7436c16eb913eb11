//! The release table: which NDK archive to fetch for a version and platform.
//!
//! The table is plain data. It is parsed once at startup from TOML (the copy
//! bundled into the binary, or a file named with `--registry`) into an
//! immutable [`VersionRegistry`], which callers receive by reference. Absence
//! of a version or platform is not an error here; the pipeline decides what
//! that means.
//!
//! The file format is an array of `[[release]]` tables:
//!
//! ```toml
//! [[release]]
//! version = 27
//! label = "r27c"
//! [release.platforms]
//! Linux64 = { url = "https://example.invalid/ndk-linux.zip", digest = "0123..." }
//! ```

use crate::platform::PlatformTag;
use camino::Utf8Path;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Release table compiled into the binary.
const BUNDLED_RELEASES: &str = include_str!("../data/releases.toml");

/// Where to fetch one platform's archive and how to check it.
///
/// The digest's length selects the hash algorithm; see [`crate::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlatformEntry {
    /// Download URL.
    pub url: String,
    /// Expected hex digest, any case.
    pub digest: String,
}

impl PlatformEntry {
    /// The last path segment of the URL, ignoring query and fragment.
    ///
    /// Returns `None` when the URL ends in `/` or has no path.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndk_installer::registry::PlatformEntry;
    ///
    /// let entry = PlatformEntry {
    ///     url: "https://dl.example.test/ndk/android-ndk-r27c-linux.zip?x=1".to_owned(),
    ///     digest: String::new(),
    /// };
    /// assert_eq!(entry.filename(), Some("android-ndk-r27c-linux.zip"));
    /// ```
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        let without_fragment = self.url.split('#').next().unwrap_or_default();
        let path = without_fragment.split('?').next().unwrap_or_default();
        let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
        let (_, tail) = after_scheme.split_once('/')?;
        tail.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

/// One NDK release and the platforms it ships for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    version: u32,
    label: Option<String>,
    platforms: BTreeMap<PlatformTag, PlatformEntry>,
}

impl Release {
    /// Build a release from its parts.
    #[must_use]
    pub fn new(
        version: u32,
        label: Option<String>,
        platforms: BTreeMap<PlatformTag, PlatformEntry>,
    ) -> Self {
        Self {
            version,
            label,
            platforms,
        }
    }

    /// The release number.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Upstream revision name (for example `r27c`), when recorded.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Supported platforms and their entries.
    #[must_use]
    pub fn platforms(&self) -> &BTreeMap<PlatformTag, PlatformEntry> {
        &self.platforms
    }

    /// The entry for `tag`, if this release supports it.
    #[must_use]
    pub fn platform(&self, tag: PlatformTag) -> Option<&PlatformEntry> {
        self.platforms.get(&tag)
    }
}

/// Errors arising from loading the release table.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The table file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// The file that was requested.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The table is not valid TOML or does not match the schema.
    #[error("malformed release table: {0}")]
    Parse(#[from] toml::de::Error),

    /// A platform key is not a known tag.
    #[error("release {version}: {source}")]
    UnknownPlatform {
        /// The release containing the bad key.
        version: u32,
        /// The parse failure.
        #[source]
        source: crate::platform::UnknownPlatform,
    },

    /// The same version appears twice.
    #[error("release {version} is listed more than once")]
    DuplicateVersion {
        /// The repeated version.
        version: u32,
    },

    /// Version numbers start at 1.
    #[error("release versions must be positive, found 0")]
    ZeroVersion,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default, rename = "release")]
    releases: Vec<ReleaseRecord>,
}

#[derive(Debug, Deserialize)]
struct ReleaseRecord {
    version: u32,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    platforms: BTreeMap<String, PlatformEntry>,
}

/// Immutable mapping from release number to [`Release`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRegistry {
    releases: BTreeMap<u32, Release>,
}

impl VersionRegistry {
    /// Load the table bundled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error only if the bundled data is malformed.
    pub fn bundled() -> Result<Self, RegistryError> {
        Self::from_toml_str(BUNDLED_RELEASES)
    }

    /// Load a table from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Read`] if the file cannot be read, or any
    /// parse or validation error from [`Self::from_toml_str`].
    pub fn from_file(path: &Utf8Path) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a table from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed TOML, unknown platform keys, duplicate
    /// versions, or a version of zero.
    pub fn from_toml_str(text: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(text)?;
        let releases = file
            .releases
            .into_iter()
            .map(|record| -> Result<Release, RegistryError> {
                let platforms = record
                    .platforms
                    .into_iter()
                    .map(|(key, entry)| {
                        key.parse::<PlatformTag>()
                            .map(|tag| (tag, entry))
                            .map_err(|source| RegistryError::UnknownPlatform {
                                version: record.version,
                                source,
                            })
                    })
                    .collect::<Result<BTreeMap<_, _>, _>>()?;
                Ok(Release::new(record.version, record.label, platforms))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_releases(releases)
    }

    /// Build a table from releases constructed in code.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateVersion`] or
    /// [`RegistryError::ZeroVersion`].
    pub fn from_releases(
        releases: impl IntoIterator<Item = Release>,
    ) -> Result<Self, RegistryError> {
        let mut table = BTreeMap::new();
        for release in releases {
            let version = release.version();
            if version == 0 {
                return Err(RegistryError::ZeroVersion);
            }
            if table.insert(version, release).is_some() {
                return Err(RegistryError::DuplicateVersion { version });
            }
        }
        Ok(Self { releases: table })
    }

    /// The release numbered `version`.
    #[must_use]
    pub fn lookup(&self, version: u32) -> Option<&Release> {
        self.releases.get(&version)
    }

    /// The entry for `version` on `tag`.
    #[must_use]
    pub fn lookup_platform(&self, version: u32, tag: PlatformTag) -> Option<&PlatformEntry> {
        self.lookup(version).and_then(|release| release.platform(tag))
    }

    /// All releases in ascending version order.
    pub fn releases(&self) -> impl Iterator<Item = &Release> {
        self.releases.values()
    }

    /// Number of releases in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    /// Whether the table has no releases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}
