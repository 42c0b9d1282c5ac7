//! The ephemeral build directory for a single run.

use std::path::{Path, PathBuf};

use gsb_util::cleanup;

use crate::error::EngineError;

/// An ephemeral directory tree owned exclusively by one run.
///
/// Created before any compilation and removed on every exit path: Drop
/// covers normal completion and errors, the cleanup registry covers
/// interruption signals.
#[derive(Debug)]
pub struct WorkArea {
    path: PathBuf,
}

impl WorkArea {
    /// Create the work area under `parent`.
    ///
    /// A leftover tree from a crashed run of the same pid is removed first.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn create(parent: &Path) -> Result<Self, EngineError> {
        let path = parent.join(format!(".gsb-work-{}", std::process::id()));
        if path.exists() {
            cleanup::remove_with_retry(&path);
        }
        std::fs::create_dir_all(&path).map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        cleanup::register(&path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkArea {
    fn drop(&mut self) {
        cleanup::remove_with_retry(&self.path);
        cleanup::unregister(&self.path);
    }
}
