//! The gsb build pipeline.
//!
//! One invocation runs a single sequential flow: check tools, probe the
//! compiler, ensure and verify the pinned dependency tarball, build the
//! dependency and the daemon inside an ephemeral work area, smoke-test the
//! result, and atomically publish it. When a container command is
//! configured the same flow runs inside the container instead, via
//! transparent self-invocation.

pub mod build;
pub mod delegate;
pub mod deps;
pub mod error;
pub mod smoke;
pub mod workarea;

use std::path::{Path, PathBuf};

use gsb_config::{BuildConfig, BuildManifest, DependencySpec};
use gsb_toolchain::profile::kernel_profile;
use gsb_util::fs as gsb_fs;

pub use error::EngineError;
use workarea::WorkArea;

/// Directory (relative to the project root) receiving published binaries.
pub const OUTPUT_DIR: &str = "usrbin";

/// Directory (relative to the project root) caching dependency tarballs.
pub const DEPS_DIR: &str = "deps";

/// File name of the published daemon for a platform.
pub fn published_file_name(name: &str, kernel: &str, arch: &str) -> String {
    format!("{name}-{kernel}-{arch}")
}

fn host_pipeline(
    config: &BuildConfig,
    root: &Path,
    manifest: &BuildManifest,
    published: &Path,
) -> Result<(), EngineError> {
    let profile = kernel_profile(&config.kernel);

    eprintln!("    Checking required tools");
    gsb_toolchain::ensure_tools(config, &profile)?;

    eprintln!("    Probing {} flags", profile.cxx);
    let flags = gsb_toolchain::probe(config)?;

    let spec = DependencySpec::from_path(&root.join("deps.toml"))?;
    let tarball = deps::ensure_tarball(&spec, &root.join(DEPS_DIR), config.download_deps)?;
    eprintln!("    Verifying {}", tarball.display());
    deps::verify(&spec, &tarball)?;

    let output_dir = root.join(OUTPUT_DIR);
    gsb_fs::ensure_dir(&output_dir)?;
    let work = WorkArea::create(root)?;

    let dep = build::build_dependency(&work, &tarball, &flags, &config.cpu)?;
    let tmp = build::TempBinary::new(output_dir.join(format!("{}.tmp", manifest.package.name)));
    build::build_daemon(
        &root.join(&manifest.package.sources),
        tmp.path(),
        &flags,
        &dep,
        &config.cpu,
    )?;

    let fixture = smoke::SmokeFixture::create(work.path())?;
    smoke::validate(tmp.path(), &fixture)?;

    tmp.publish(published)
}

/// Run the whole pipeline for a resolved configuration.
///
/// Returns the path of the published binary.
///
/// # Errors
/// Every pipeline failure is fatal and surfaces here; nothing is silently
/// swallowed.
pub fn run(config: &BuildConfig, root: &Path) -> Result<PathBuf, EngineError> {
    let manifest = BuildManifest::from_path(&root.join("gsb.toml"))?;
    let published = root.join(OUTPUT_DIR).join(published_file_name(
        &manifest.package.name,
        &config.kernel,
        &config.arch,
    ));

    if config.docker_cmd.is_some() {
        delegate::delegate(config, root)?;
        if !published.is_file() {
            return Err(EngineError::DelegateNoArtifact {
                path: published.display().to_string(),
            });
        }
    } else {
        host_pipeline(config, root, &manifest, &published)?;
    }

    eprintln!("    Published {}", published.display());
    Ok(published)
}
