//! Empirical compiler flag probing.
//!
//! Hardening flags vary by compiler, version, and libc; instead of guessing
//! from version strings, each candidate is trial-compiled with `-Werror` and
//! kept only if the compiler accepts it. A rejected flag is dropped
//! silently, never treated as fatal.

use std::path::Path;
use std::process::Command;

use gsb_config::BuildConfig;
use gsb_util::process::run_capture;

use crate::error::ToolchainError;
use crate::profile::{kernel_profile, StaticMode};

/// The flags a build actually gets to use, after probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainFlags {
    pub cxx: String,
    pub make: String,
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub static_mode: StaticMode,
    pub include_paths: Vec<String>,
    pub lib_paths: Vec<String>,
    pub link_iconv: bool,
}

const PROBE_SOURCE: &str = "int main() { return 0; }\n";

/// Linker arguments for a static mode, in command-line order.
pub fn static_link_args(mode: StaticMode) -> &'static [&'static str] {
    match mode {
        StaticMode::None => &[],
        StaticMode::Static => &["-static"],
        StaticMode::StaticPie => &["-static-pie"],
    }
}

fn flag_accepted(cxx: &str, scratch: &Path, flag: &str) -> bool {
    let source = scratch.join("probe.cc");
    let output = scratch.join("probe.out");
    let mut cmd = Command::new(cxx);
    cmd.arg("-Werror")
        .arg(flag)
        .arg(&source)
        .arg("-o")
        .arg(&output);
    matches!(run_capture(&mut cmd), Ok(result) if result.success)
}

/// Probe the compiler for the target kernel and assemble [`ToolchainFlags`].
///
/// # Errors
/// Returns an error if scratch space cannot be created or the compiler
/// cannot build even an empty program. A rejected candidate flag is not an
/// error.
pub fn probe(config: &BuildConfig) -> Result<ToolchainFlags, ToolchainError> {
    let profile = kernel_profile(&config.kernel);
    let scratch =
        tempfile::tempdir().map_err(|source| ToolchainError::Scratch { source })?;
    let source = scratch.path().join("probe.cc");
    std::fs::write(&source, PROBE_SOURCE)
        .map_err(|e| ToolchainError::Scratch { source: e })?;

    // Sanity first: a compiler that cannot build an empty program would make
    // every candidate look rejected.
    let sanity_out = scratch.path().join("probe.out");
    let sanity = run_capture(
        Command::new(profile.cxx)
            .arg(&source)
            .arg("-o")
            .arg(&sanity_out),
    )?;
    if !sanity.success {
        return Err(ToolchainError::CompilerUnusable {
            cxx: profile.cxx.to_owned(),
            stderr: sanity.stderr,
        });
    }

    let root = std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf());
    let candidates = [
        format!("-ffile-prefix-map={}=.", root.display()),
        "-fstack-clash-protection".to_owned(),
        "-fcf-protection".to_owned(),
    ];
    let mut cxxflags = Vec::new();
    for flag in candidates {
        if flag_accepted(profile.cxx, scratch.path(), &flag) {
            cxxflags.push(flag);
        }
    }

    let mut ldflags = Vec::new();
    let relro = "-Wl,-z,relro,-z,now";
    if flag_accepted(profile.cxx, scratch.path(), relro) {
        ldflags.push(relro.to_owned());
    }

    // Prefer static-PIE; when the toolchain rejects it, plain static is the
    // unprobed fallback because the kernels that need static linking need it
    // unconditionally.
    let static_mode = match profile.static_ceiling {
        StaticMode::StaticPie => {
            if flag_accepted(profile.cxx, scratch.path(), "-static-pie") {
                StaticMode::StaticPie
            } else {
                StaticMode::Static
            }
        }
        mode => mode,
    };

    Ok(ToolchainFlags {
        cxx: profile.cxx.to_owned(),
        make: profile.make.to_owned(),
        cxxflags,
        ldflags,
        static_mode,
        include_paths: profile.include_paths.iter().map(|p| (*p).to_owned()).collect(),
        lib_paths: profile.lib_paths.iter().map(|p| (*p).to_owned()).collect(),
        link_iconv: profile.link_iconv,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cxx_available() -> bool {
        Command::new("c++").arg("--version").output().is_ok()
    }

    #[test]
    fn static_args_follow_the_mode() {
        assert!(static_link_args(StaticMode::None).is_empty());
        assert_eq!(static_link_args(StaticMode::Static), &["-static"]);
        assert_eq!(static_link_args(StaticMode::StaticPie), &["-static-pie"]);
    }

    #[test]
    fn nonsense_flags_are_rejected() {
        if !cxx_available() {
            return;
        }
        let scratch = tempfile::tempdir().unwrap();
        std::fs::write(scratch.path().join("probe.cc"), PROBE_SOURCE).unwrap();
        assert!(!flag_accepted("c++", scratch.path(), "-fgsb-no-such-flag"));
    }

    #[test]
    fn plain_optimization_flag_is_accepted() {
        if !cxx_available() {
            return;
        }
        let scratch = tempfile::tempdir().unwrap();
        std::fs::write(scratch.path().join("probe.cc"), PROBE_SOURCE).unwrap();
        assert!(flag_accepted("c++", scratch.path(), "-O2"));
    }

    #[test]
    fn probe_produces_usable_flags_on_the_host() {
        if !cxx_available() {
            return;
        }
        let config = BuildConfig {
            arch: "x86_64".to_owned(),
            cpu: "x86-64".to_owned(),
            kernel: "linux".to_owned(),
            docker_cmd: None,
            docker_image: None,
            install_tools: false,
            download_deps: false,
        };
        let flags = probe(&config).unwrap();
        assert_eq!(flags.cxx, "c++");
        assert_eq!(flags.make, "make");
        // Linux either supports static-pie or falls back to plain static.
        assert_ne!(flags.static_mode, StaticMode::None);
    }

    #[test]
    fn missing_compiler_surfaces_as_util_error() {
        let config = BuildConfig {
            arch: "x86_64".to_owned(),
            cpu: "x86-64".to_owned(),
            kernel: "freebsd".to_owned(),
            docker_cmd: None,
            docker_image: None,
            install_tools: false,
            download_deps: false,
        };
        if crate::tools::find_tool("clang++").is_some() {
            return;
        }
        assert!(probe(&config).is_err());
    }
}
