//! Static per-kernel toolchain profiles.
//!
//! Compiler and make-tool selection is table-driven, not probed: the BSDs
//! ship GNU make as `gmake` and keep third-party headers outside the default
//! search path, Darwin cannot link statically at all, and Windows-like
//! kernels must link statically because their loaders cannot handle PIE
//! dynamic executables.

/// How the final binary is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticMode {
    /// Dynamic linking only.
    None,
    /// `-static`.
    Static,
    /// `-static-pie`, with `-static` as the probe fallback.
    StaticPie,
}

/// Fixed toolchain facts for one kernel family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelProfile {
    /// C++ compiler command.
    pub cxx: &'static str,
    /// Make implementation to drive the dependency build.
    pub make: &'static str,
    /// Extra `-I` search paths.
    pub include_paths: &'static [&'static str],
    /// Extra `-L` search paths.
    pub lib_paths: &'static [&'static str],
    /// Whether `-liconv` is needed (iconv is not part of libc there).
    pub link_iconv: bool,
    /// The most aggressive static mode worth probing for this kernel.
    pub static_ceiling: StaticMode,
}

const LINUX: KernelProfile = KernelProfile {
    cxx: "c++",
    make: "make",
    include_paths: &[],
    lib_paths: &[],
    link_iconv: false,
    static_ceiling: StaticMode::StaticPie,
};

const FREEBSD: KernelProfile = KernelProfile {
    cxx: "clang++",
    make: "gmake",
    include_paths: &["/usr/local/include"],
    lib_paths: &["/usr/local/lib"],
    link_iconv: true,
    static_ceiling: StaticMode::StaticPie,
};

const NETBSD: KernelProfile = KernelProfile {
    cxx: "c++",
    make: "gmake",
    include_paths: &["/usr/pkg/include"],
    lib_paths: &["/usr/pkg/lib"],
    link_iconv: true,
    static_ceiling: StaticMode::StaticPie,
};

const OPENBSD: KernelProfile = KernelProfile {
    cxx: "c++",
    make: "gmake",
    include_paths: &["/usr/local/include"],
    lib_paths: &["/usr/local/lib"],
    link_iconv: true,
    static_ceiling: StaticMode::StaticPie,
};

const DARWIN: KernelProfile = KernelProfile {
    cxx: "c++",
    make: "make",
    include_paths: &[],
    lib_paths: &[],
    link_iconv: true,
    static_ceiling: StaticMode::None,
};

// msys/mingw/cygwin: the loader cannot start PIE static binaries.
const WINDOWS_NT: KernelProfile = KernelProfile {
    cxx: "c++",
    make: "make",
    include_paths: &[],
    lib_paths: &[],
    link_iconv: true,
    static_ceiling: StaticMode::Static,
};

/// Select the toolchain profile for a normalized kernel identifier.
///
/// Unknown kernels get the Linux defaults, which are also the most portable
/// guess.
pub fn kernel_profile(kernel: &str) -> KernelProfile {
    if kernel.contains("_nt-") {
        return WINDOWS_NT;
    }
    match kernel {
        "freebsd" => FREEBSD,
        "netbsd" => NETBSD,
        "openbsd" => OPENBSD,
        "darwin" => DARWIN,
        _ => LINUX,
    }
}
