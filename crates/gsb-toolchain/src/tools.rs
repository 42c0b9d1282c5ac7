//! External tool discovery and optional installation.

use std::path::{Path, PathBuf};
use std::process::Command;

use gsb_config::BuildConfig;
use gsb_util::process::run_streamed;

use crate::error::ToolchainError;
use crate::profile::KernelProfile;

/// Locate an executable by searching PATH.
pub fn find_tool(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.is_file()
        && std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// The external commands a build needs before any step runs.
///
/// Archive unpacking and file plumbing happen in-process, so only the
/// compile/link/fixture tools are required from the system (plus `curl` when
/// downloading is permitted; the hashing tools have their own fallback
/// chain).
pub fn required_tools(profile: &KernelProfile, download_deps: bool) -> Vec<&'static str> {
    let mut tools = vec![profile.cxx, "ar", "git", "cmake", profile.make, "strip"];
    if download_deps {
        tools.push("curl");
    }
    tools
}

struct Installer {
    command: &'static str,
    needs_update: bool,
}

fn known_installer() -> Option<Installer> {
    if find_tool("apk").is_some() {
        return Some(Installer {
            command: "apk",
            needs_update: false,
        });
    }
    if find_tool("apt-get").is_some() {
        return Some(Installer {
            command: "apt-get",
            needs_update: true,
        });
    }
    None
}

/// Map a missing tool to the package that provides it.
fn package_for(tool: &str) -> &'static str {
    match tool {
        "c++" | "g++" | "clang++" => "g++",
        "ar" | "strip" => "binutils",
        "git" => "git",
        "cmake" => "cmake",
        "gmake" | "make" => "make",
        "curl" => "curl",
        _ => "build-base",
    }
}

fn install_packages(installer: &Installer, packages: &[&str]) -> Result<(), ToolchainError> {
    if installer.needs_update {
        let status = run_streamed(Command::new(installer.command).arg("update"))?;
        if !status.success() {
            return Err(ToolchainError::InstallFailed {
                installer: installer.command.to_owned(),
                code: status.code(),
            });
        }
    }
    let mut cmd = Command::new(installer.command);
    match installer.command {
        "apk" => {
            cmd.arg("add").arg("--no-cache");
        }
        _ => {
            cmd.arg("install").arg("-y");
        }
    }
    cmd.args(packages);
    let status = run_streamed(&mut cmd)?;
    if status.success() {
        Ok(())
    } else {
        Err(ToolchainError::InstallFailed {
            installer: installer.command.to_owned(),
            code: status.code(),
        })
    }
}

/// Check that every required tool is present, installing the missing set
/// when the configuration allows it.
///
/// # Errors
/// Returns `ToolMissing` when a tool is absent and installation was not
/// requested, `CannotAutoInstall` when it was requested but no package
/// installer is known here, and `InstallFailed` when the installer ran and
/// failed.
pub fn ensure_tools(config: &BuildConfig, profile: &KernelProfile) -> Result<(), ToolchainError> {
    let required = required_tools(profile, config.download_deps);
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|tool| find_tool(tool).is_none())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    if !config.install_tools {
        return Err(ToolchainError::ToolMissing {
            tools: missing.join(", "),
        });
    }

    let Some(installer) = known_installer() else {
        return Err(ToolchainError::CannotAutoInstall {
            tools: missing.join(", "),
            kernel: config.kernel.clone(),
        });
    };

    let mut packages: Vec<&str> = missing.iter().map(|tool| package_for(tool)).collect();
    packages.sort_unstable();
    packages.dedup();
    eprintln!("    Installing packages: {}", packages.join(" "));
    install_packages(&installer, &packages)?;

    // The installer succeeded; anything still absent is unrecoverable.
    if let Some(tool) = missing.iter().find(|tool| find_tool(tool).is_none()) {
        return Err(ToolchainError::ToolMissing {
            tools: (*tool).to_owned(),
        });
    }
    Ok(())
}
