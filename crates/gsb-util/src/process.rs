//! Process execution helpers for gsb.

use std::process::{Command, ExitStatus};

use crate::error::UtilError;

/// Structured output from a captured command execution.
#[derive(Debug)]
pub struct CommandOutput {
    /// Standard output as a string.
    pub stdout: String,
    /// Standard error as a string.
    pub stderr: String,
    /// Whether the command exited successfully.
    pub success: bool,
    /// The exit code, if the process was not killed by a signal.
    pub exit_code: Option<i32>,
}

/// Execute a command and capture its output.
///
/// # Errors
/// Returns an error if the command cannot be spawned (e.g. binary not found).
/// A non-zero exit code is **not** an error; check `CommandOutput::success`.
pub fn run_capture(cmd: &mut Command) -> Result<CommandOutput, UtilError> {
    let output = cmd
        .output()
        .map_err(|source| UtilError::CommandExec { source })?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
        exit_code: output.status.code(),
    })
}

/// Execute a command with inherited stdio, streaming its output to the user.
///
/// Used for the long-running steps (cmake, make, the container run) where
/// compiler and downloader output must stay visible.
///
/// # Errors
/// Returns an error if the command cannot be spawned. A non-zero exit status
/// is **not** an error; inspect the returned status.
pub fn run_streamed(cmd: &mut Command) -> Result<ExitStatus, UtilError> {
    cmd.status()
        .map_err(|source| UtilError::CommandExec { source })
}
