//! Compile the pinned dependency and link the daemon binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use gsb_toolchain::probe::{static_link_args, ToolchainFlags};
use gsb_util::{archive, cleanup, process::run_streamed};

use crate::error::EngineError;
use crate::workarea::WorkArea;

/// Where the dependency build left its headers and static library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyBuild {
    pub include_dir: PathBuf,
    pub lib_dir: PathBuf,
}

/// Parallel job count for the dependency build.
pub fn core_count() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(8)
}

/// The conservative libgit2 feature set: static, threaded, no network, no
/// crypto backends, bundled fallbacks over system libraries.
pub fn cmake_configure_args(src: &Path, build: &Path, cpu: &str) -> Vec<String> {
    vec![
        "-S".to_owned(),
        src.display().to_string(),
        "-B".to_owned(),
        build.display().to_string(),
        "-DCMAKE_BUILD_TYPE=Release".to_owned(),
        format!("-DCMAKE_C_FLAGS=-march={cpu}"),
        "-DBUILD_SHARED_LIBS=OFF".to_owned(),
        "-DTHREADSAFE=ON".to_owned(),
        "-DUSE_SSH=OFF".to_owned(),
        "-DUSE_HTTPS=OFF".to_owned(),
        "-DUSE_GSSAPI=OFF".to_owned(),
        "-DUSE_NTLMCLIENT=OFF".to_owned(),
        "-DUSE_BUNDLED_ZLIB=ON".to_owned(),
        "-DREGEX_BACKEND=builtin".to_owned(),
        "-DUSE_HTTP_PARSER=builtin".to_owned(),
        "-DBUILD_CLAR=OFF".to_owned(),
    ]
}

fn run_step(step: &'static str, cmd: &mut Command) -> Result<(), EngineError> {
    let status = run_streamed(cmd).map_err(EngineError::Util)?;
    if status.success() {
        Ok(())
    } else {
        Err(EngineError::Compile {
            step,
            code: status.code(),
        })
    }
}

/// Unpack the verified tarball into the work area and build it.
///
/// # Errors
/// Returns an error if extraction fails or either build step exits non-zero.
pub fn build_dependency(
    work: &WorkArea,
    tarball: &Path,
    flags: &ToolchainFlags,
    cpu: &str,
) -> Result<DependencyBuild, EngineError> {
    let src_area = work.path().join("dep-src");
    archive::extract_tarball(tarball, &src_area)?;
    let src_root = archive::single_root_dir(&src_area)?;
    let build_dir = work.path().join("dep-build");

    eprintln!("    Configuring {}", src_root.display());
    run_step(
        "cmake",
        Command::new("cmake").args(cmake_configure_args(&src_root, &build_dir, cpu)),
    )?;

    let jobs = core_count();
    eprintln!("    Compiling with {jobs} jobs");
    run_step(
        "make",
        Command::new(&flags.make)
            .arg(format!("-j{jobs}"))
            .current_dir(&build_dir),
    )?;

    Ok(DependencyBuild {
        include_dir: src_root.join("include"),
        lib_dir: build_dir,
    })
}

/// Collect the daemon's `.cc` sources, sorted for a reproducible link line.
///
/// # Errors
/// Returns `NoSources` when the directory holds nothing to compile.
pub fn collect_sources(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let entries = std::fs::read_dir(dir).map_err(|source| EngineError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    let mut sources: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "cc"))
        .collect();
    sources.sort();
    if sources.is_empty() {
        return Err(EngineError::NoSources {
            dir: dir.display().to_string(),
        });
    }
    Ok(sources)
}

/// The full compile-and-link invocation for the daemon binary.
pub fn daemon_compile_args(
    sources: &[PathBuf],
    output: &Path,
    flags: &ToolchainFlags,
    dep: &DependencyBuild,
    cpu: &str,
) -> Vec<String> {
    let mut args = vec![
        "-std=c++17".to_owned(),
        format!("-march={cpu}"),
        "-O2".to_owned(),
        "-DNDEBUG".to_owned(),
    ];
    args.extend(flags.cxxflags.iter().cloned());
    args.push(format!("-I{}", dep.include_dir.display()));
    for path in &flags.include_paths {
        args.push(format!("-I{path}"));
    }
    args.extend(sources.iter().map(|s| s.display().to_string()));
    args.push("-o".to_owned());
    args.push(output.display().to_string());
    args.push(format!("-L{}", dep.lib_dir.display()));
    for path in &flags.lib_paths {
        args.push(format!("-L{path}"));
    }
    args.extend(flags.ldflags.iter().cloned());
    args.extend(static_link_args(flags.static_mode).iter().map(|s| (*s).to_owned()));
    args.push("-lgit2".to_owned());
    args.push("-lpthread".to_owned());
    if flags.link_iconv {
        args.push("-liconv".to_owned());
    }
    args
}

/// The not-yet-published daemon binary.
///
/// Registered with the cleanup registry on creation and removed on Drop
/// unless published, so a failed link, strip, or smoke test leaves no
/// `.tmp` file behind; the registry covers interruption signals the same
/// way.
#[derive(Debug)]
pub struct TempBinary {
    path: PathBuf,
    published: bool,
}

impl TempBinary {
    pub fn new(path: PathBuf) -> Self {
        cleanup::register(&path);
        Self {
            path,
            published: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename into the published location. The artifact becomes visible all
    /// at once, never partially written.
    ///
    /// # Errors
    /// Returns an error if the rename fails.
    pub fn publish(mut self, dest: &Path) -> Result<(), EngineError> {
        std::fs::rename(&self.path, dest).map_err(|source| EngineError::Io {
            path: dest.display().to_string(),
            source,
        })?;
        self.published = true;
        Ok(())
    }
}

impl Drop for TempBinary {
    fn drop(&mut self) {
        if !self.published {
            cleanup::remove_with_retry(&self.path);
        }
        cleanup::unregister(&self.path);
    }
}

/// Compile, link, and strip the daemon into a temporary binary.
///
/// The binary lands at a `.tmp` name distinct from the published one; the
/// caller renames it only after validation.
///
/// # Errors
/// Returns an error if source collection, the link, or the strip fails.
pub fn build_daemon(
    sources_dir: &Path,
    output_tmp: &Path,
    flags: &ToolchainFlags,
    dep: &DependencyBuild,
    cpu: &str,
) -> Result<(), EngineError> {
    let sources = collect_sources(sources_dir)?;

    eprintln!("    Linking {}", output_tmp.display());
    run_step(
        "link",
        Command::new(&flags.cxx).args(daemon_compile_args(
            &sources, output_tmp, flags, dep, cpu,
        )),
    )?;
    run_step("strip", Command::new("strip").arg(output_tmp))?;
    Ok(())
}
