//! Toolchain selection for gsb.
//!
//! Static per-kernel profiles pick the compiler and make tool; external
//! tools are discovered on PATH (and optionally installed); hardening and
//! static-linking flags are admitted only after a successful trial
//! compilation, never inferred from compiler versions.

pub mod error;
pub mod probe;
pub mod profile;
pub mod tools;

pub use error::ToolchainError;
pub use probe::{probe, ToolchainFlags};
pub use profile::{kernel_profile, KernelProfile, StaticMode};
pub use tools::{ensure_tools, find_tool, required_tools};
