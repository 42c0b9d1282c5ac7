//! Cleanup registry shared between scope guards and the interrupt handler.
//!
//! Every ephemeral path a run creates (work area, fetch temp file, unpublished
//! binary) is registered here. Normal completion unregisters each path as its
//! owner drops it; an interrupt walks the registry instead, so both exit paths
//! release the same resources.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

static REGISTRY: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

/// Pause before the second removal attempt, to ride out transient locks
/// (antivirus scanners, slow NFS handles).
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Register an ephemeral path for removal on interrupt.
pub fn register(path: &Path) {
    if let Ok(mut registry) = REGISTRY.lock() {
        registry.push(path.to_path_buf());
    }
}

/// Remove a path from the registry, typically after its owner removed or
/// published it.
pub fn unregister(path: &Path) {
    if let Ok(mut registry) = REGISTRY.lock() {
        registry.retain(|p| p != path);
    }
}

/// Remove every registered path. Called from the interrupt handler.
pub fn run_cleanup() {
    let paths: Vec<PathBuf> = match REGISTRY.lock() {
        Ok(mut registry) => registry.drain(..).collect(),
        Err(_) => return,
    };
    // Reverse order: inner paths (fetch temp files) before their parents.
    for path in paths.iter().rev() {
        remove_with_retry(path);
    }
}

/// Remove a file or directory tree, retrying once after a short pause.
///
/// Returns whether the path is gone afterwards. Best-effort by design: a
/// cleanup failure must never mask the error that triggered it.
pub fn remove_with_retry(path: &Path) -> bool {
    if try_remove(path) {
        return true;
    }
    std::thread::sleep(RETRY_DELAY);
    try_remove(path)
}

fn try_remove(path: &Path) -> bool {
    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        // Already gone.
        return true;
    };
    if metadata.is_dir() {
        std::fs::remove_dir_all(path).is_ok()
    } else {
        std::fs::remove_file(path).is_ok()
    }
}
