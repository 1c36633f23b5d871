//! User configuration loaded from `<home>/config.toml`.
//!
//! Every field is optional; a missing file is the same as an empty one.
//!
//! ```toml
//! package_manager = "pkg"
//! jobs = 4
//! build_timeout_secs = 1800
//! java_runtime = "java"
//! java_package = "openjdk-17"
//! git = "git"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::deps::PackageManagerKind;

const DEFAULT_JAVA_RUNTIME: &str = "java";
const DEFAULT_JAVA_PACKAGE: &str = "openjdk-17";
const DEFAULT_GRADLE_PACKAGE: &str = "gradle";
const DEFAULT_GIT: &str = "git";

/// Errors that can occur when loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or has unknown keys.
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// spkg configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// OS package manager to use; auto-detected from `PATH` when unset.
    pub package_manager: Option<PackageManagerKind>,
    /// Parallel build jobs; defaults to the logical CPU count.
    pub jobs: Option<usize>,
    /// Per-step build timeout in seconds; no timeout when unset.
    pub build_timeout_secs: Option<u64>,
    /// Runtime invoked by generated launchers for archive packages.
    pub java_runtime: Option<String>,
    /// OS package providing [`Self::java_runtime`].
    pub java_package: Option<String>,
    /// OS package providing the `gradle` command.
    pub gradle_package: Option<String>,
    /// Git executable.
    pub git: Option<String>,
}

impl Config {
    /// Load the configuration, treating a missing file as defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or parsed,
    /// or if `jobs` is zero.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] if `jobs` is zero.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        if config.jobs == Some(0) {
            return Err(ConfigError::Invalid("jobs must be at least 1".to_string()));
        }
        Ok(config)
    }

    /// Parallel job count.
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get)
    }

    /// Per-step build timeout.
    pub fn build_timeout(&self) -> Option<Duration> {
        self.build_timeout_secs.map(Duration::from_secs)
    }

    /// Runtime command for archive launchers.
    pub fn java_runtime(&self) -> &str {
        self.java_runtime.as_deref().unwrap_or(DEFAULT_JAVA_RUNTIME)
    }

    /// OS package providing the Java runtime.
    pub fn java_package(&self) -> &str {
        self.java_package.as_deref().unwrap_or(DEFAULT_JAVA_PACKAGE)
    }

    /// OS package providing `gradle`.
    pub fn gradle_package(&self) -> &str {
        self.gradle_package
            .as_deref()
            .unwrap_or(DEFAULT_GRADLE_PACKAGE)
    }

    /// Git executable.
    pub fn git(&self) -> &str {
        self.git.as_deref().unwrap_or(DEFAULT_GIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&tmp.path().join("config.toml")).unwrap();
        assert!(config.package_manager.is_none());
        assert_eq!(config.java_runtime(), "java");
        assert_eq!(config.git(), "git");
        assert!(config.build_timeout().is_none());
        assert!(config.jobs() >= 1);
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
package_manager = "apt"
jobs = 2
build_timeout_secs = 60
java_runtime = "/opt/jdk/bin/java"
"#,
        )
        .unwrap();
        assert_eq!(config.package_manager, Some(PackageManagerKind::Apt));
        assert_eq!(config.jobs(), 2);
        assert_eq!(config.build_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.java_runtime(), "/opt/jdk/bin/java");
        assert_eq!(config.java_package(), "openjdk-17");
    }

    #[test]
    fn test_rejects_unknown_keys_and_zero_jobs() {
        assert!(matches!(
            Config::parse("colour = true"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::parse("jobs = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
