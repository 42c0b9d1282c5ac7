//! Host detection and build platform resolution.
//!
//! Turns the raw identifiers from the command line (or the host itself, when
//! unspecified) into a validated [`BuildConfig`]: architecture is mapped to a
//! compiler CPU baseline, the kernel string is normalized, and container
//! delegation options are checked for consistency before anything runs.

use std::process::Command;

use gsb_config::BuildConfig;

/// Unresolved options, exactly as given on the command line.
///
/// `None` means "not specified"; resolution fills in host defaults.
#[derive(Debug, Clone, Default)]
pub struct RawOptions {
    pub arch: Option<String>,
    pub cpu: Option<String>,
    pub kernel: Option<String>,
    pub docker_cmd: Option<String>,
    pub docker_image: Option<String>,
    pub install_tools: bool,
    pub download_deps: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("unsupported architecture `{arch}`: no CPU baseline known, pass one with -c")]
    UnsupportedArch { arch: String },
    #[error("malformed kernel identifier `{kernel}`")]
    BadKernel { kernel: String },
    #[error("a docker image (-i) requires a docker command (-d)")]
    ImageWithoutCommand,
    #[error("docker delegation is only supported when building for linux, not `{kernel}`")]
    DelegationUnsupported { kernel: String },
    #[error("no default docker image for architecture `{arch}`: pass one with -i")]
    NoDefaultImage { arch: String },
}

/// Map an architecture identifier to its compiler CPU baseline.
pub fn cpu_for_arch(arch: &str) -> Option<&'static str> {
    match arch {
        "aarch64" | "arm64" => Some("armv8-a"),
        "x86_64" | "amd64" => Some("x86-64"),
        "i686" => Some("i686"),
        "armv7l" => Some("armv7"),
        "armv6l" => Some("armv6"),
        "riscv64" => Some("rv64imafdc"),
        "s390x" => Some("z196"),
        "ppc64le" => Some("powerpc64le"),
        _ => None,
    }
}

/// Map an architecture to the minimal Linux userspace image used for
/// delegated builds.
pub fn default_image(arch: &str) -> Option<&'static str> {
    match arch {
        "x86_64" => Some("alpine"),
        "aarch64" => Some("arm64v8/alpine"),
        "armv7l" => Some("arm32v7/alpine"),
        "armv6l" => Some("arm32v6/alpine"),
        "i686" => Some("i386/alpine"),
        "ppc64le" => Some("ppc64le/alpine"),
        "s390x" => Some("s390x/alpine"),
        _ => None,
    }
}

fn uname(flag: &str) -> Option<String> {
    let output = Command::new("uname").arg(flag).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_lowercase();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Detect the host machine architecture (`uname -m`, lowercased).
pub fn host_arch() -> String {
    uname("-m").unwrap_or_else(|| std::env::consts::ARCH.to_owned())
}

/// Detect the host kernel name (`uname -s`, lowercased).
pub fn host_kernel() -> String {
    uname("-s").unwrap_or_else(|| match std::env::consts::OS {
        "macos" => "darwin".to_owned(),
        os => os.to_owned(),
    })
}

/// Normalize a kernel identifier.
///
/// Lowercases the value; Windows-like identifiers (`name_nt-MAJOR.MINOR...`)
/// are truncated to `name_nt-MAJOR.MINOR` so one build covers a whole kernel
/// family. A `_nt-` value that does not carry a parseable version is
/// rejected.
///
/// # Errors
/// Returns `BadKernel` for malformed Windows-like identifiers.
pub fn normalize_kernel(raw: &str) -> Result<String, PlatformError> {
    let kernel = raw.to_lowercase();
    if !kernel.contains("_nt-") {
        return Ok(kernel);
    }
    let Ok(re) = regex::Regex::new(r"^([a-z0-9]+)_nt-([0-9]+)\.([0-9]+)") else {
        return Err(PlatformError::BadKernel { kernel });
    };
    let Some(caps) = re.captures(&kernel) else {
        return Err(PlatformError::BadKernel { kernel });
    };
    match (caps.get(1), caps.get(2), caps.get(3)) {
        (Some(name), Some(major), Some(minor)) => Ok(format!(
            "{}_nt-{}.{}",
            name.as_str(),
            major.as_str(),
            minor.as_str()
        )),
        _ => Err(PlatformError::BadKernel { kernel }),
    }
}

/// Resolve raw command-line options into a validated [`BuildConfig`].
///
/// # Errors
/// Returns an error for an unmappable architecture without an explicit CPU,
/// a malformed kernel identifier, or an inconsistent delegation request.
pub fn resolve(raw: &RawOptions) -> Result<BuildConfig, PlatformError> {
    let arch = raw
        .arch
        .clone()
        .unwrap_or_else(host_arch)
        .to_lowercase();

    let cpu = match &raw.cpu {
        Some(cpu) => cpu.clone(),
        None => cpu_for_arch(&arch)
            .map(str::to_owned)
            .ok_or_else(|| PlatformError::UnsupportedArch { arch: arch.clone() })?,
    };

    let kernel = normalize_kernel(&raw.kernel.clone().unwrap_or_else(host_kernel))?;

    if raw.docker_image.is_some() && raw.docker_cmd.is_none() {
        return Err(PlatformError::ImageWithoutCommand);
    }

    let docker_image = match &raw.docker_cmd {
        None => None,
        Some(_) => {
            if kernel != "linux" {
                return Err(PlatformError::DelegationUnsupported { kernel });
            }
            match &raw.docker_image {
                Some(image) => Some(image.clone()),
                None => Some(
                    default_image(&arch)
                        .map(str::to_owned)
                        .ok_or_else(|| PlatformError::NoDefaultImage { arch: arch.clone() })?,
                ),
            }
        }
    };

    Ok(BuildConfig {
        arch,
        cpu,
        kernel,
        docker_cmd: raw.docker_cmd.clone(),
        docker_image,
        install_tools: raw.install_tools,
        download_deps: raw.download_deps,
    })
}
