//! Resolved build configuration and the pinned-dependency manifest.

pub mod config;
pub mod manifest;

pub use config::{BuildConfig, ConfigError};
pub use manifest::{BuildManifest, DependencySpec, ManifestError};
