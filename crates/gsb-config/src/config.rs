//! The resolved build configuration and its environment round-trip.
//!
//! Container delegation re-invokes the orchestrator inside an image, and the
//! child must see exactly the configuration the host resolved. The config is
//! serialized to a flat `GSB_*` environment map on the host and deserialized
//! from it in the child; the container fields are deliberately not forwarded
//! so a delegated run can never delegate again.

use std::collections::HashMap;

/// Marker variable identifying a delegated (in-container) invocation.
pub const ENV_DELEGATED: &str = "GSB_DELEGATED";

const ENV_ARCH: &str = "GSB_ARCH";
const ENV_CPU: &str = "GSB_CPU";
const ENV_KERNEL: &str = "GSB_KERNEL";
const ENV_INSTALL_TOOLS: &str = "GSB_INSTALL_TOOLS";
const ENV_DOWNLOAD_DEPS: &str = "GSB_DOWNLOAD_DEPS";

/// A fully resolved build configuration.
///
/// Immutable once produced by the platform resolver: `cpu` and `kernel` are
/// guaranteed non-empty, and `docker_image` is `Some` only when `docker_cmd`
/// is too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Normalized machine architecture (e.g. `x86_64`, `aarch64`).
    pub arch: String,
    /// CPU baseline passed to the compiler's `-march` (e.g. `armv8-a`).
    pub cpu: String,
    /// Normalized kernel identifier (e.g. `linux`, `darwin`, `msys_nt-10.0`).
    pub kernel: String,
    /// Container command for delegated builds (e.g. `docker`, `sudo docker`).
    pub docker_cmd: Option<String>,
    /// Container image for delegated builds.
    pub docker_image: Option<String>,
    /// Whether missing build tools may be installed with a package manager.
    pub install_tools: bool,
    /// Whether the dependency tarball may be downloaded when absent.
    pub download_deps: bool,
}

impl BuildConfig {
    /// Serialize the configuration for a delegated child invocation.
    ///
    /// The container fields are not included: the child always runs the
    /// pipeline in-process.
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_DELEGATED, "1".to_owned()),
            (ENV_ARCH, self.arch.clone()),
            (ENV_CPU, self.cpu.clone()),
            (ENV_KERNEL, self.kernel.clone()),
            (ENV_INSTALL_TOOLS, flag_str(self.install_tools)),
            (ENV_DOWNLOAD_DEPS, flag_str(self.download_deps)),
        ]
    }

    /// Deserialize a configuration from an environment map.
    ///
    /// # Errors
    /// Returns an error if any forwarded variable is absent, empty, or (for
    /// the boolean flags) not `0`/`1`.
    pub fn from_env_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self {
            arch: require(vars, ENV_ARCH)?,
            cpu: require(vars, ENV_CPU)?,
            kernel: require(vars, ENV_KERNEL)?,
            docker_cmd: None,
            docker_image: None,
            install_tools: parse_flag(vars, ENV_INSTALL_TOOLS)?,
            download_deps: parse_flag(vars, ENV_DOWNLOAD_DEPS)?,
        })
    }

    /// Deserialize a configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if any forwarded variable is absent or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_env_map(&vars)
    }

    /// Whether this process is a delegated child running inside a container.
    pub fn is_delegated_invocation() -> bool {
        std::env::var(ENV_DELEGATED).is_ok_and(|v| v == "1")
    }
}

fn flag_str(value: bool) -> String {
    if value { "1" } else { "0" }.to_owned()
}

fn require(vars: &HashMap<String, String>, name: &'static str) -> Result<String, ConfigError> {
    match vars.get(name) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(ConfigError::MissingEnv { name }),
    }
}

fn parse_flag(vars: &HashMap<String, String>, name: &'static str) -> Result<bool, ConfigError> {
    match vars.get(name).map(String::as_str) {
        Some("1") => Ok(true),
        Some("0") => Ok(false),
        Some(value) => Err(ConfigError::BadEnvValue {
            name,
            value: value.to_owned(),
        }),
        None => Err(ConfigError::MissingEnv { name }),
    }
}

/// Errors produced by configuration (de)serialization.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A forwarded environment variable is absent or empty.
    #[error("{name} is not set — delegated invocations must receive the full configuration")]
    MissingEnv { name: &'static str },

    /// A boolean environment variable holds something other than `0`/`1`.
    #[error("{name} holds \"{value}\" — expected 0 or 1")]
    BadEnvValue { name: &'static str, value: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::{prop_assert_eq, proptest};

    use super::*;

    fn sample() -> BuildConfig {
        BuildConfig {
            arch: "aarch64".to_owned(),
            cpu: "armv8-a".to_owned(),
            kernel: "linux".to_owned(),
            docker_cmd: Some("docker".to_owned()),
            docker_image: Some("arm64v8/alpine".to_owned()),
            install_tools: true,
            download_deps: false,
        }
    }

    fn env_map(config: &BuildConfig) -> HashMap<String, String> {
        config
            .to_env()
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect()
    }

    #[test]
    fn round_trip_drops_container_fields() {
        let config = sample();
        let child = BuildConfig::from_env_map(&env_map(&config)).unwrap();
        assert_eq!(child.arch, config.arch);
        assert_eq!(child.cpu, config.cpu);
        assert_eq!(child.kernel, config.kernel);
        assert_eq!(child.install_tools, config.install_tools);
        assert_eq!(child.download_deps, config.download_deps);
        assert!(child.docker_cmd.is_none());
        assert!(child.docker_image.is_none());
    }

    #[test]
    fn to_env_marks_delegation() {
        let env = env_map(&sample());
        assert_eq!(env.get(ENV_DELEGATED).map(String::as_str), Some("1"));
    }

    #[test]
    fn flags_serialize_as_digits() {
        let env = env_map(&sample());
        assert_eq!(env.get(ENV_INSTALL_TOOLS).map(String::as_str), Some("1"));
        assert_eq!(env.get(ENV_DOWNLOAD_DEPS).map(String::as_str), Some("0"));
    }

    #[test]
    fn missing_variable_errors() {
        let mut env = env_map(&sample());
        env.remove(ENV_CPU);
        let err = BuildConfig::from_env_map(&env).unwrap_err();
        assert!(err.to_string().contains("GSB_CPU"));
    }

    #[test]
    fn empty_variable_errors() {
        let mut env = env_map(&sample());
        env.insert(ENV_KERNEL.to_owned(), String::new());
        assert!(BuildConfig::from_env_map(&env).is_err());
    }

    #[test]
    fn bad_flag_value_errors() {
        let mut env = env_map(&sample());
        env.insert(ENV_DOWNLOAD_DEPS.to_owned(), "yes".to_owned());
        let err = BuildConfig::from_env_map(&env).unwrap_err();
        assert!(err.to_string().contains("yes"));
    }

    proptest! {
        #[test]
        fn round_trip_is_lossless_for_forwarded_fields(
            arch in "[a-z0-9_]{1,16}",
            cpu in "[a-z0-9-]{1,16}",
            kernel in "[a-z0-9_.-]{1,20}",
            install in proptest::bool::ANY,
            download in proptest::bool::ANY,
        ) {
            let config = BuildConfig {
                arch,
                cpu,
                kernel,
                docker_cmd: None,
                docker_image: None,
                install_tools: install,
                download_deps: download,
            };
            let child = BuildConfig::from_env_map(&env_map(&config)).unwrap();
            prop_assert_eq!(child, config);
        }
    }
}
