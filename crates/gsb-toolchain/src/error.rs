//! Error types for gsb-toolchain.

#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    /// One or more required external commands are absent.
    #[error("missing required tools: {tools} — install them and re-run")]
    ToolMissing { tools: String },

    /// Tool installation was requested but no installer is known for the
    /// target kernel.
    #[error("missing required tools: {tools} — automatic installation is not supported on {kernel}")]
    CannotAutoInstall { tools: String, kernel: String },

    /// The package installer ran and failed.
    #[error("`{installer}` failed to install missing tools (exit code {code:?})")]
    InstallFailed { installer: String, code: Option<i32> },

    /// The configured compiler cannot build even an empty program.
    #[error("`{cxx}` cannot compile a trivial program:\n{stderr}")]
    CompilerUnusable { cxx: String, stderr: String },

    /// An error propagated from gsb-util.
    #[error("{0}")]
    Util(#[from] gsb_util::UtilError),

    /// I/O error while preparing probe scratch space.
    #[error("cannot prepare probe scratch dir: {source}")]
    Scratch { source: std::io::Error },
}
