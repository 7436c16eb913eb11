//! Archive integrity checks.
//!
//! The hash algorithm is not recorded in the release table; it is inferred
//! from the length of the expected hex digest. A digest of any other length
//! disables verification for that archive with a warning. A mismatch is
//! always a hard failure.
//!
//! Successful verifications are remembered by path for the rest of the run,
//! since several platform tags can share one universal archive.

use log::{debug, warn};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Hash algorithms a release digest can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// MD5, 32 hex characters.
    Md5,
    /// SHA-1, 40 hex characters.
    Sha1,
    /// SHA-256, 64 hex characters.
    Sha256,
    /// SHA-384, 96 hex characters.
    Sha384,
    /// SHA-512, 128 hex characters.
    Sha512,
}

impl DigestAlgorithm {
    /// Infer the algorithm from a hex digest length.
    ///
    /// Only the standard lengths are recognised; 98 in particular is not.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndk_installer::verify::DigestAlgorithm;
    ///
    /// assert_eq!(DigestAlgorithm::from_hex_len(40), Some(DigestAlgorithm::Sha1));
    /// assert_eq!(DigestAlgorithm::from_hex_len(98), None);
    /// ```
    #[must_use]
    pub const fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(Self::Md5),
            40 => Some(Self::Sha1),
            64 => Some(Self::Sha256),
            96 => Some(Self::Sha384),
            128 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Hash the file at `path`, returning lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from reading the file.
    pub fn hash_file(self, path: &Path) -> std::io::Result<String> {
        match self {
            Self::Md5 => hash_file_with::<Md5>(path),
            Self::Sha1 => hash_file_with::<Sha1>(path),
            Self::Sha256 => hash_file_with::<Sha256>(path),
            Self::Sha384 => hash_file_with::<Sha384>(path),
            Self::Sha512 => hash_file_with::<Sha512>(path),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        })
    }
}

fn hash_file_with<D: Digest>(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(hex_lower(&hasher.finalize()))
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        if write!(out, "{byte:02x}").is_err() {
            // Writing to a String cannot fail.
        }
    }
    out
}

/// How a successful verification came about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The digest was computed and matched.
    Verified(DigestAlgorithm),
    /// The path was already verified earlier in this run.
    AlreadyVerified,
    /// The expected digest has an unrecognised length; nothing was checked.
    Unchecked {
        /// Length of the expected digest.
        digest_len: usize,
    },
}

/// Errors arising from verification.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The computed digest differs from the expected one.
    #[error("{algorithm} mismatch for {path}: expected {expected}, got {actual}")]
    Mismatch {
        /// The archive that failed.
        path: PathBuf,
        /// Algorithm used.
        algorithm: DigestAlgorithm,
        /// Expected digest, as recorded.
        expected: String,
        /// Digest actually computed.
        actual: String,
    },

    /// The archive could not be read.
    #[error("cannot read {path} for verification: {source}")]
    Read {
        /// The archive that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Verifies archives, remembering successes for the rest of the run.
#[derive(Debug, Default)]
pub struct IntegrityVerifier {
    verified: HashSet<PathBuf>,
    digests_computed: usize,
}

impl IntegrityVerifier {
    /// Create a verifier with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `path` against `expected_digest` (hex, any case).
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Mismatch`] when the digests differ and
    /// [`VerifyError::Read`] when the file cannot be hashed.
    pub fn verify(
        &mut self,
        path: &Path,
        expected_digest: &str,
    ) -> Result<VerifyOutcome, VerifyError> {
        if self.verified.contains(path) {
            debug!("{} already verified this run", path.display());
            return Ok(VerifyOutcome::AlreadyVerified);
        }

        let expected = expected_digest.trim();
        let Some(algorithm) = DigestAlgorithm::from_hex_len(expected.len()) else {
            warn!(
                "digest for {} has unrecognised length {}; skipping verification",
                path.display(),
                expected.len()
            );
            return Ok(VerifyOutcome::Unchecked {
                digest_len: expected.len(),
            });
        };

        self.digests_computed += 1;
        let actual = algorithm.hash_file(path).map_err(|source| VerifyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(VerifyError::Mismatch {
                path: path.to_path_buf(),
                algorithm,
                expected: expected.to_ascii_lowercase(),
                actual,
            });
        }

        debug!("{algorithm} verified {}", path.display());
        self.verified.insert(path.to_path_buf());
        Ok(VerifyOutcome::Verified(algorithm))
    }

    /// Number of digests actually computed so far.
    #[must_use]
    pub fn digests_computed(&self) -> usize {
        self.digests_computed
    }

    /// Whether `path` has been verified this run.
    #[must_use]
    pub fn is_verified(&self, path: &Path) -> bool {
        self.verified.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Digests of the ASCII bytes `hello world`.
    const MD5_HELLO: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
    const SHA1_HELLO: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
    const SHA256_HELLO: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    const SHA384_HELLO: &str = "fdbd8e75a67f29f701a4e040385e2e23986303ea10239211af907fcbb83578b3e417cb71ce646efd0819dd8c088de1bd";
    const SHA512_HELLO: &str = "309ecc489c12d6eb4cc40f50c902f2b4d0ed77ee511a7c7a9bcd3ca86d4cd86f989dd35bc5ff499670da34255b45b0cfd830e81f605dcf7dc5542e93ae9cd76f";

    fn hello_file() -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("hello.zip");
        std::fs::write(&path, b"hello world").expect("write");
        (temp, path)
    }

    #[rstest]
    #[case::md5(32, Some(DigestAlgorithm::Md5))]
    #[case::sha1(40, Some(DigestAlgorithm::Sha1))]
    #[case::sha256(64, Some(DigestAlgorithm::Sha256))]
    #[case::sha384(96, Some(DigestAlgorithm::Sha384))]
    #[case::sha512(128, Some(DigestAlgorithm::Sha512))]
    #[case::historical_98(98, None)]
    #[case::empty(0, None)]
    fn algorithm_is_chosen_by_length(
        #[case] len: usize,
        #[case] expected: Option<DigestAlgorithm>,
    ) {
        assert_eq!(DigestAlgorithm::from_hex_len(len), expected);
    }

    #[rstest]
    #[case::md5(MD5_HELLO, DigestAlgorithm::Md5)]
    #[case::sha1(SHA1_HELLO, DigestAlgorithm::Sha1)]
    #[case::sha256(SHA256_HELLO, DigestAlgorithm::Sha256)]
    #[case::sha384(SHA384_HELLO, DigestAlgorithm::Sha384)]
    #[case::sha512(SHA512_HELLO, DigestAlgorithm::Sha512)]
    fn verify_accepts_matching_digest(#[case] digest: &str, #[case] algorithm: DigestAlgorithm) {
        let (_temp, path) = hello_file();
        let mut verifier = IntegrityVerifier::new();
        let outcome = verifier.verify(&path, digest).expect("digest matches");
        assert_eq!(outcome, VerifyOutcome::Verified(algorithm));
    }

    #[test]
    fn hex_lower_pads_every_byte() {
        assert_eq!(hex_lower(&[0x00, 0x0a, 0xff]), "000aff");
        assert_eq!(hex_lower(&[]), "");
    }

    #[test]
    fn verify_is_case_insensitive() {
        let (_temp, path) = hello_file();
        let mut verifier = IntegrityVerifier::new();
        let outcome = verifier
            .verify(&path, &SHA1_HELLO.to_ascii_uppercase())
            .expect("digest matches");
        assert_eq!(outcome, VerifyOutcome::Verified(DigestAlgorithm::Sha1));
    }

    #[test]
    fn verify_reports_mismatch() {
        let (_temp, path) = hello_file();
        let mut verifier = IntegrityVerifier::new();
        let err = verifier
            .verify(&path, &"0".repeat(40))
            .expect_err("digest differs");
        match err {
            VerifyError::Mismatch {
                algorithm, actual, ..
            } => {
                assert_eq!(algorithm, DigestAlgorithm::Sha1);
                assert_eq!(actual, SHA1_HELLO);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
        assert!(!verifier.is_verified(&path));
    }

    #[test]
    fn second_verification_of_same_path_does_not_rehash() {
        let (_temp, path) = hello_file();
        let mut verifier = IntegrityVerifier::new();
        verifier.verify(&path, SHA1_HELLO).expect("first");
        let second = verifier.verify(&path, SHA1_HELLO).expect("second");
        assert_eq!(second, VerifyOutcome::AlreadyVerified);
        assert_eq!(verifier.digests_computed(), 1);
    }

    #[test]
    fn mismatch_is_not_cached_as_success() {
        let (_temp, path) = hello_file();
        let mut verifier = IntegrityVerifier::new();
        assert!(verifier.verify(&path, &"f".repeat(64)).is_err());
        assert!(verifier.verify(&path, &"f".repeat(64)).is_err());
        assert_eq!(verifier.digests_computed(), 2);
    }

    /// A 98-character digest sits next to SHA-384 in historical tables, but
    /// SHA-384 is 96 characters. It is treated as unrecognised: the archive
    /// is accepted unchecked, with a warning, rather than hashed with a guess.
    #[test]
    fn digest_of_length_98_is_left_unchecked() {
        let (_temp, path) = hello_file();
        let mut verifier = IntegrityVerifier::new();
        let digest = format!("{SHA384_HELLO}00");
        let outcome = verifier.verify(&path, &digest).expect("soft fail");
        assert_eq!(outcome, VerifyOutcome::Unchecked { digest_len: 98 });
        assert_eq!(verifier.digests_computed(), 0);
        assert!(!verifier.is_verified(&path));
    }

    #[test]
    fn unreadable_file_is_a_read_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let mut verifier = IntegrityVerifier::new();
        let err = verifier
            .verify(&temp.path().join("missing.zip"), SHA1_HELLO)
            .expect_err("missing file");
        assert!(matches!(err, VerifyError::Read { .. }));
    }
}
