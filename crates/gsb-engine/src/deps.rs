//! Pinned dependency cache: fetch, atomic placement, digest verification.
//!
//! Compilation only ever proceeds against a tarball whose SHA-256 matches
//! the pinned expectation, whether it came from the cache or was just
//! downloaded. A fetch lands in a private temp file first and is renamed
//! into the cache path atomically, so an interrupted run never leaves a
//! half-written cache entry.

use std::path::{Path, PathBuf};

use gsb_config::DependencySpec;
use gsb_util::{cleanup, download, fs as gsb_fs, hash};

use crate::error::EngineError;

/// Ensure the pinned tarball exists at its cache path, downloading it if
/// permitted. Returns the cache path.
///
/// # Errors
/// Returns `TarballMissing` when the tarball is absent and downloading is
/// not permitted, or a fetch error when the download fails.
pub fn ensure_tarball(
    spec: &DependencySpec,
    deps_dir: &Path,
    download_deps: bool,
) -> Result<PathBuf, EngineError> {
    let cache_path = deps_dir.join(spec.cache_file_name());
    if cache_path.is_file() {
        return Ok(cache_path);
    }
    if !download_deps {
        return Err(EngineError::TarballMissing {
            path: cache_path.display().to_string(),
        });
    }

    gsb_fs::ensure_dir(deps_dir)?;
    eprintln!("    Downloading {}", spec.url);

    // Same filesystem as the cache path, so the final rename is atomic.
    let tmp = tempfile::NamedTempFile::new_in(deps_dir).map_err(|source| EngineError::Io {
        path: deps_dir.display().to_string(),
        source,
    })?;
    cleanup::register(tmp.path());
    let tmp_path = tmp.path().to_path_buf();

    let fetched = download::fetch(&spec.url, tmp.path());
    let result = match fetched {
        Ok(()) => tmp
            .persist(&cache_path)
            .map(|_| cache_path.clone())
            .map_err(|e| EngineError::Io {
                path: cache_path.display().to_string(),
                source: e.error,
            }),
        Err(e) => Err(EngineError::Util(e)),
    };
    cleanup::unregister(&tmp_path);
    result
}

/// Verify the tarball against the pinned digest. Runs on every invocation,
/// cache hit or not.
///
/// # Errors
/// Returns `HashMismatch` when the digests differ, or a hashing error when
/// no usable hashing tool exists.
pub fn verify(spec: &DependencySpec, tarball: &Path) -> Result<(), EngineError> {
    let actual = hash::file_sha256(tarball)?;
    if actual == spec.sha256 {
        Ok(())
    } else {
        Err(EngineError::HashMismatch {
            path: tarball.display().to_string(),
            expected: spec.sha256.clone(),
            actual,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use sha2::{Digest, Sha256};

    use super::*;

    fn spec_for(content: &[u8]) -> DependencySpec {
        let mut hasher = Sha256::new();
        hasher.update(content);
        DependencySpec {
            name: "libgit2".to_owned(),
            version: "1.7.2".to_owned(),
            sha256: format!("{:x}", hasher.finalize()),
            url: "https://example.invalid/libgit2.tar.gz".to_owned(),
        }
    }

    fn hash_tool_available() -> bool {
        ["sha256sum", "shasum", "openssl"].iter().any(|tool| {
            std::process::Command::new(tool)
                .arg("--help")
                .output()
                .is_ok()
        })
    }

    #[test]
    fn cache_hit_short_circuits() {
        let deps = tempfile::tempdir().unwrap();
        let spec = spec_for(b"tarball");
        let cached = deps.path().join(spec.cache_file_name());
        std::fs::write(&cached, b"tarball").unwrap();

        // download_deps=false would fail on a miss, so success proves the hit.
        let path = ensure_tarball(&spec, deps.path(), false).unwrap();
        assert_eq!(path, cached);
    }

    #[test]
    fn cache_miss_without_download_names_the_path() {
        let deps = tempfile::tempdir().unwrap();
        let spec = spec_for(b"tarball");

        let err = ensure_tarball(&spec, deps.path(), false).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("libgit2-1.7.2.tar.gz"));
        assert!(matches!(err, EngineError::TarballMissing { .. }));
    }

    #[test]
    fn cache_miss_with_download_fetches_file_url() {
        if std::process::Command::new("curl")
            .arg("--version")
            .output()
            .is_err()
        {
            return;
        }
        let deps = tempfile::tempdir().unwrap();
        let origin = deps.path().join("origin.tar.gz");
        std::fs::write(&origin, b"tarball").unwrap();

        let mut spec = spec_for(b"tarball");
        spec.url = format!("file://{}", origin.display());

        let path = ensure_tarball(&spec, deps.path(), true).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"tarball");
        verify(&spec, &path).unwrap_or_else(|e| {
            // Hash verification needs an external tool; skip there.
            assert!(matches!(e, EngineError::Util(_)));
        });
    }

    #[test]
    fn verify_accepts_matching_digest() {
        if !hash_tool_available() {
            return;
        }
        let deps = tempfile::tempdir().unwrap();
        let spec = spec_for(b"pinned content");
        let tarball = deps.path().join(spec.cache_file_name());
        std::fs::write(&tarball, b"pinned content").unwrap();
        verify(&spec, &tarball).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_content() {
        if !hash_tool_available() {
            return;
        }
        let deps = tempfile::tempdir().unwrap();
        let spec = spec_for(b"pinned content");
        let tarball = deps.path().join(spec.cache_file_name());
        std::fs::write(&tarball, b"tampered content").unwrap();

        let err = verify(&spec, &tarball).unwrap_err();
        match err {
            EngineError::HashMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, spec.sha256);
                assert_ne!(actual, expected);
            }
            other => panic!("expected HashMismatch, got {other}"),
        }
    }
}
