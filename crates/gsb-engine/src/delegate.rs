//! Re-run the whole pipeline inside a container.
//!
//! Delegation is transparent self-invocation: the orchestrator binary is
//! copied into the project root, the root is mounted read-write at a fixed
//! mount point, and the copy runs inside the image with the resolved
//! configuration passed as environment. Host and container share one code
//! path, so both produce byte-identical artifacts for the same inputs.

use std::path::Path;
use std::process::Command;

use gsb_config::BuildConfig;
use gsb_util::{cleanup, process::run_streamed};

use crate::error::EngineError;

/// Where the project root appears inside the container.
pub const MOUNT_POINT: &str = "/mnt";

/// Name of the orchestrator copy dropped into the project root.
pub const HELPER_NAME: &str = ".gsb-delegate";

/// Arguments for the container run, after the container command itself.
pub fn container_args(env: &[(&'static str, String)], root: &Path, image: &str) -> Vec<String> {
    let mut args = vec!["run".to_owned(), "--rm".to_owned()];
    for (key, value) in env {
        args.push("-e".to_owned());
        args.push(format!("{key}={value}"));
    }
    args.push("-v".to_owned());
    args.push(format!("{}:{MOUNT_POINT}", root.display()));
    args.push("-w".to_owned());
    args.push(MOUNT_POINT.to_owned());
    args.push(image.to_owned());
    args.push(format!("{MOUNT_POINT}/{HELPER_NAME}"));
    args
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Run the pipeline inside the configured container and wait for it.
///
/// # Errors
/// Returns `DelegateSetup` if the helper copy cannot be prepared and
/// `Delegate` if the containerized run exits non-zero.
pub fn delegate(config: &BuildConfig, root: &Path) -> Result<(), EngineError> {
    let Some(docker_cmd) = &config.docker_cmd else {
        return Err(EngineError::DelegateSetup {
            message: "no container command configured".to_owned(),
        });
    };
    let Some(image) = &config.docker_image else {
        return Err(EngineError::DelegateSetup {
            message: "no container image configured".to_owned(),
        });
    };

    let exe = std::env::current_exe().map_err(|e| EngineError::DelegateSetup {
        message: format!("cannot locate own executable: {e}"),
    })?;
    let helper = root.join(HELPER_NAME);
    std::fs::copy(&exe, &helper)
        .and_then(|_| make_executable(&helper))
        .map_err(|e| EngineError::DelegateSetup {
            message: format!("cannot stage {}: {e}", helper.display()),
        })?;
    cleanup::register(&helper);

    let mut parts = docker_cmd.split_whitespace();
    let Some(program) = parts.next() else {
        cleanup::remove_with_retry(&helper);
        cleanup::unregister(&helper);
        return Err(EngineError::DelegateSetup {
            message: "container command is blank".to_owned(),
        });
    };

    eprintln!("    Delegating build to {image}");
    let mut cmd = Command::new(program);
    cmd.args(parts)
        .args(container_args(&config.to_env(), root, image));
    let outcome = run_streamed(&mut cmd);

    cleanup::remove_with_retry(&helper);
    cleanup::unregister(&helper);

    let status = outcome.map_err(EngineError::Util)?;
    if status.success() {
        Ok(())
    } else {
        Err(EngineError::Delegate {
            code: status.code(),
        })
    }
}
