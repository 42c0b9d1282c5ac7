//! Parse and validate `gsb.toml` and `deps.toml`.

use std::path::Path;

use serde::Deserialize;

const SHA256_HEX_LEN: usize = 64;

/// The `gsb.toml` build manifest: what to compile and what to call it.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildManifest {
    pub package: Package,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Package {
    /// Base name of the published daemon binary.
    pub name: String,
    /// Directory holding the daemon's C++ sources, relative to the project root.
    #[serde(default = "default_sources")]
    pub sources: String,
}

fn default_sources() -> String {
    "src".to_owned()
}

impl BuildManifest {
    /// Read and parse a `gsb.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let manifest: BuildManifest =
            toml::from_str(&content).map_err(|source| ManifestError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        if manifest.package.name.is_empty() {
            return Err(ManifestError::EmptyField {
                path: path.display().to_string(),
                field: "package.name",
            });
        }
        Ok(manifest)
    }
}

/// The `deps.toml` wrapper table. Exactly one pinned dependency per project.
#[derive(Debug, Clone, Deserialize)]
struct DepsManifest {
    dependency: DependencySpec,
}

/// The single pinned native dependency.
///
/// All four fields are mandatory; a manifest missing any of them is an
/// internal configuration error, not something a user can correct at the
/// command line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DependencySpec {
    pub name: String,
    pub version: String,
    /// Expected SHA-256 of the source tarball, lowercase hex.
    pub sha256: String,
    /// Full download URL for the pinned version.
    pub url: String,
}

impl DependencySpec {
    /// Read and validate a `deps.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the TOML is invalid or
    /// incomplete, or the pinned digest is not 64 lowercase hex characters.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let manifest: DepsManifest =
            toml::from_str(&content).map_err(|source| ManifestError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        let spec = manifest.dependency;

        for (field, value) in [
            ("dependency.name", &spec.name),
            ("dependency.version", &spec.version),
            ("dependency.url", &spec.url),
        ] {
            if value.is_empty() {
                return Err(ManifestError::EmptyField {
                    path: path.display().to_string(),
                    field,
                });
            }
        }

        let digest_ok = spec.sha256.len() == SHA256_HEX_LEN
            && spec
                .sha256
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !digest_ok {
            return Err(ManifestError::BadDigest {
                value: spec.sha256,
            });
        }

        Ok(spec)
    }

    /// File name of the cached tarball for this pinned version.
    pub fn cache_file_name(&self) -> String {
        format!("{}-{}.tar.gz", self.name, self.version)
    }
}

/// Errors produced by manifest parsing.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid manifest at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("{field} is empty in {path}")]
    EmptyField { path: String, field: &'static str },

    #[error("pinned sha256 \"{value}\" is not 64 lowercase hex characters")]
    BadDigest { value: String },
}
