//! Small filesystem helpers.

use std::path::Path;

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b").join("c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn ensure_dir_existing_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        ensure_dir(tmp.path()).unwrap();
    }
}
