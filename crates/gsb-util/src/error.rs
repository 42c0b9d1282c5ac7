//! Error types for gsb-util.

/// Errors produced by utility functions.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// An I/O operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A command failed to execute.
    #[error("cannot execute command: {source}")]
    CommandExec { source: std::io::Error },

    /// curl is not installed, so nothing can be fetched.
    #[error("curl not found — install curl, or pre-place the tarball and drop -w")]
    FetchToolMissing,

    /// Both curl invocation variants failed.
    #[error("download failed for {url} — tried curl with and without the user configuration")]
    FetchExhausted { url: String },

    /// No SHA-256 capable hashing tool is installed.
    #[error("no usable hashing tool — install sha256sum, shasum, or openssl")]
    NoHashTool,

    /// A hashing tool is installed but could not digest the file.
    #[error("{tool} cannot hash {path}: {message}")]
    HashToolFailed {
        tool: &'static str,
        path: String,
        message: String,
    },

    /// A tarball entry attempted to escape the extraction directory.
    #[error("tarball contains path traversal entry \"{entry}\" escaping {dest}")]
    PathTraversal { entry: String, dest: String },

    /// A tarball could not be unpacked.
    #[error("cannot extract {path}: {message}")]
    Extract { path: String, message: String },
}
