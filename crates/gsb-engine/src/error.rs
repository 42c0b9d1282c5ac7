//! Error types for gsb-engine.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// An error propagated from gsb-util.
    #[error("{0}")]
    Util(#[from] gsb_util::UtilError),

    /// An error propagated from gsb-toolchain.
    #[error("{0}")]
    Toolchain(#[from] gsb_toolchain::ToolchainError),

    /// An error propagated from manifest parsing.
    #[error("{0}")]
    Manifest(#[from] gsb_config::ManifestError),

    /// The pinned tarball is absent and downloading was not permitted.
    #[error("dependency tarball not found at {path} — re-run with -w to allow downloading")]
    TarballMissing { path: String },

    /// The cached tarball does not match its pinned digest.
    #[error("sha256 mismatch for {path}\n  expected: {expected}\n  actual:   {actual}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// The source directory holds nothing to compile.
    #[error("no .cc sources found in {dir}")]
    NoSources { dir: String },

    /// A compilation step ran and failed.
    #[error("{step} failed (exit code {code:?})")]
    Compile { step: &'static str, code: Option<i32> },

    /// The smoke test fixture could not be prepared.
    #[error("cannot prepare smoke test fixture: {message}")]
    Fixture { message: String },

    /// The built binary misbehaved under the smoke test.
    #[error("smoke test failed: {reason}")]
    SmokeTest { reason: String },

    /// Delegated container setup failed before the container ran.
    #[error("cannot set up delegated build: {message}")]
    DelegateSetup { message: String },

    /// The delegated container run exited non-zero.
    #[error("delegated build failed (exit code {code:?})")]
    Delegate { code: Option<i32> },

    /// The delegated run finished but left no published artifact behind.
    #[error("delegated build finished but {path} was not produced")]
    DelegateNoArtifact { path: String },
}
