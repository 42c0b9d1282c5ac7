//! Tarball extraction with path-traversal rejection.

use std::path::{Component, Path, PathBuf};

use crate::error::UtilError;

/// Extract a `.tar.gz` tarball into `dest`.
///
/// Each entry's path is validated to ensure it stays within `dest`, and
/// symlink/hardlink targets must be relative without `..` components, so a
/// tampered tarball cannot write outside the work area — not even through a
/// link planted by an earlier entry.
///
/// # Errors
/// Returns an error if the archive is unreadable or corrupt, or if any entry
/// attempts directory traversal.
pub fn extract_tarball(tarball: &Path, dest: &Path) -> Result<(), UtilError> {
    crate::fs::ensure_dir(dest)?;
    let canonical_dest = std::fs::canonicalize(dest).map_err(|source| UtilError::Io {
        path: dest.display().to_string(),
        source,
    })?;

    let file = std::fs::File::open(tarball).map_err(|source| UtilError::Io {
        path: tarball.display().to_string(),
        source,
    })?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    let entries = archive.entries().map_err(|e| UtilError::Extract {
        path: tarball.display().to_string(),
        message: e.to_string(),
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| UtilError::Extract {
            path: tarball.display().to_string(),
            message: e.to_string(),
        })?;

        let entry_path = entry
            .path()
            .map_err(|e| UtilError::Extract {
                path: tarball.display().to_string(),
                message: e.to_string(),
            })?
            .into_owned();

        if entry_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(UtilError::PathTraversal {
                entry: entry_path.display().to_string(),
                dest: canonical_dest.display().to_string(),
            });
        }

        let target = canonical_dest.join(&entry_path);
        if !target.starts_with(&canonical_dest) {
            return Err(UtilError::PathTraversal {
                entry: entry_path.display().to_string(),
                dest: canonical_dest.display().to_string(),
            });
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let link = entry
                .link_name()
                .map_err(|e| UtilError::Extract {
                    path: tarball.display().to_string(),
                    message: e.to_string(),
                })?
                .ok_or_else(|| UtilError::Extract {
                    path: tarball.display().to_string(),
                    message: format!("link entry {} has no target", entry_path.display()),
                })?;
            // A relative target without `..` resolves under dest; anything
            // else could redirect a later entry outside it.
            if link.is_absolute()
                || link.components().any(|c| matches!(c, Component::ParentDir))
            {
                return Err(UtilError::PathTraversal {
                    entry: format!("{} -> {}", entry_path.display(), link.display()),
                    dest: canonical_dest.display().to_string(),
                });
            }
        }

        if let Some(parent) = target.parent() {
            crate::fs::ensure_dir(parent)?;
        }

        entry.unpack(&target).map_err(|e| UtilError::Extract {
            path: tarball.display().to_string(),
            message: e.to_string(),
        })?;
    }

    Ok(())
}

/// Return the single top-level directory inside `dir`.
///
/// Source tarballs unpack to one `name-version/` root; anything else means
/// the archive is not what was pinned.
///
/// # Errors
/// Returns an error if `dir` cannot be read or does not contain exactly one
/// directory.
pub fn single_root_dir(dir: &Path) -> Result<PathBuf, UtilError> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|source| UtilError::Io {
            path: dir.display().to_string(),
            source,
        })?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();

    if dirs.len() == 1 {
        if let Some(root) = dirs.pop() {
            return Ok(root);
        }
    }
    Err(UtilError::Extract {
        path: dir.display().to_string(),
        message: format!("expected a single unpacked directory, found {}", dirs.len()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    /// A raw USTAR header, so malicious `..` paths and link targets survive
    /// verbatim (the `tar` crate's builder would reject them before our
    /// validation ever runs).
    fn tar_header(path: &str, size: usize, typeflag: u8, link: Option<&str>) -> [u8; 512] {
        let mut header = [0u8; 512];
        let name = path.as_bytes();
        header[..name.len().min(99)].copy_from_slice(&name[..name.len().min(99)]);
        header[100..108].copy_from_slice(b"0000644\0");
        header[108..116].copy_from_slice(b"0001000\0");
        header[116..124].copy_from_slice(b"0001000\0");
        let size = format!("{size:011o}\0");
        header[124..136].copy_from_slice(size.as_bytes());
        header[136..148].copy_from_slice(b"00000000000\0");
        header[156] = typeflag;
        if let Some(target) = link {
            let target = target.as_bytes();
            header[157..157 + target.len().min(99)]
                .copy_from_slice(&target[..target.len().min(99)]);
        }
        header[257..263].copy_from_slice(b"ustar\0");
        header[263..265].copy_from_slice(b"00");

        header[148..156].copy_from_slice(b"        ");
        let cksum: u32 = header.iter().map(|&b| u32::from(b)).sum();
        let cksum = format!("{cksum:06o}\0 ");
        header[148..156].copy_from_slice(cksum.as_bytes());
        header
    }

    fn create_tarball(entries: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        {
            let gz = flate2::write::GzEncoder::new(&tmp, flate2::Compression::fast());
            let mut out = std::io::BufWriter::new(gz);

            for &(path, content) in entries {
                out.write_all(&tar_header(path, content.len(), b'0', None))
                    .unwrap();
                out.write_all(content).unwrap();
                let pad = content.len() % 512;
                if pad != 0 {
                    out.write_all(&vec![0u8; 512 - pad]).unwrap();
                }
            }
            out.write_all(&[0u8; 1024]).unwrap();
            out.flush().unwrap();
        }
        tmp
    }

    fn create_link_tarball(path: &str, target: &str, typeflag: u8) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        {
            let gz = flate2::write::GzEncoder::new(&tmp, flate2::Compression::fast());
            let mut out = std::io::BufWriter::new(gz);
            out.write_all(&tar_header(path, 0, typeflag, Some(target)))
                .unwrap();
            out.write_all(&[0u8; 1024]).unwrap();
            out.flush().unwrap();
        }
        tmp
    }

    #[test]
    fn extract_safe_paths() {
        let tarball = create_tarball(&[("libgit2-1.0/README", b"hello")]);
        let dest = tempfile::tempdir().unwrap();

        extract_tarball(tarball.path(), dest.path()).unwrap();
        assert!(dest.path().join("libgit2-1.0").join("README").exists());
    }

    #[test]
    fn extract_rejects_parent_traversal() {
        let tarball = create_tarball(&[("../../etc/evil", b"pwned")]);
        let dest = tempfile::tempdir().unwrap();

        let err = extract_tarball(tarball.path(), dest.path()).unwrap_err();
        assert!(matches!(err, UtilError::PathTraversal { .. }));
    }

    #[test]
    fn extract_rejects_dotdot_mid_path() {
        let tarball = create_tarball(&[("src/../../escape", b"pwned")]);
        let dest = tempfile::tempdir().unwrap();

        let err = extract_tarball(tarball.path(), dest.path()).unwrap_err();
        assert!(matches!(err, UtilError::PathTraversal { .. }));
    }

    #[test]
    fn extract_rejects_symlink_with_parent_target() {
        let tarball = create_link_tarball("dep/escape", "../../outside", b'2');
        let dest = tempfile::tempdir().unwrap();

        let err = extract_tarball(tarball.path(), dest.path()).unwrap_err();
        assert!(matches!(err, UtilError::PathTraversal { .. }));
    }

    #[test]
    fn extract_rejects_symlink_with_absolute_target() {
        let tarball = create_link_tarball("dep/passwd", "/etc/passwd", b'2');
        let dest = tempfile::tempdir().unwrap();

        let err = extract_tarball(tarball.path(), dest.path()).unwrap_err();
        assert!(matches!(err, UtilError::PathTraversal { .. }));
    }

    #[test]
    fn extract_rejects_hard_link_escaping_dest() {
        let tarball = create_link_tarball("dep/alias", "../../../etc/shadow", b'1');
        let dest = tempfile::tempdir().unwrap();

        let err = extract_tarball(tarball.path(), dest.path()).unwrap_err();
        assert!(matches!(err, UtilError::PathTraversal { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn extract_allows_relative_symlink_inside_dest() {
        let tarball = create_link_tarball("dep/alias", "real-file", b'2');
        let dest = tempfile::tempdir().unwrap();

        extract_tarball(tarball.path(), dest.path()).unwrap();
        let link = dest.path().join("dep").join("alias");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
    }

    #[test]
    fn extract_missing_tarball_errors() {
        let dest = tempfile::tempdir().unwrap();
        let result = extract_tarball(Path::new("/nonexistent/t.tar.gz"), dest.path());
        assert!(matches!(result, Err(UtilError::Io { .. })));
    }

    #[test]
    fn single_root_dir_finds_it() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("libgit2-1.7.2");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(dir.path().join("pax_global_header"), b"").unwrap();

        assert_eq!(single_root_dir(dir.path()).unwrap(), root);
    }

    #[test]
    fn single_root_dir_rejects_multiple() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();

        assert!(single_root_dir(dir.path()).is_err());
    }

    #[test]
    fn single_root_dir_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(single_root_dir(dir.path()).is_err());
    }
}
