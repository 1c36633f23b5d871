//! The package registry: one table of immutable [`PackageSpec`] records
//! keyed by name.
//!
//! ```toml
//! [packages.sl]
//! url = "https://github.com/mtoyoda/sl"
//! requires = ["make", { tool = "cc", package = "clang" }]
//! build = [["make"], { copy = "sl" }]
//!
//! [packages.fzf]
//! url = "https://github.com/junegunn/fzf"
//! requires = [{ tool = "go", package = "golang" }]
//! ```

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::spec::{BuildPlan, BuildStep, PackageSpec, Requirement};
use crate::types::{NameError, PackageName};

/// Errors that can occur when loading a registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The registry file could not be read.
    #[error("Failed to read registry {}: {source}", .path.display())]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML content does not match the registry schema.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A `[packages.<key>]` key is not a valid package name.
    #[error("Invalid package key '{key}': {source}")]
    InvalidName {
        /// The offending key.
        key: String,
        /// Why the key was rejected.
        #[source]
        source: NameError,
    },

    /// Two keys normalize to the same package name.
    #[error("Package '{0}' is defined more than once")]
    Duplicate(PackageName),

    /// An entry has an empty repository URL.
    #[error("Package '{0}' has an empty url")]
    MissingUrl(PackageName),

    /// `bin` is not a plain file name inside the managed bin directory.
    #[error("Package '{name}' has invalid bin '{bin}': must be a plain file name")]
    InvalidBin {
        /// Package the entry belongs to.
        name: PackageName,
        /// The rejected value.
        bin: String,
    },

    /// A `copy` step points outside the working tree.
    #[error("Package '{name}' copies '{path}': must be a relative path inside the source tree")]
    UnsafeCopy {
        /// Package the entry belongs to.
        name: PackageName,
        /// The rejected path.
        path: String,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    packages: BTreeMap<String, RegistryEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryEntry {
    url: String,
    #[serde(default)]
    build: BuildPlan,
    #[serde(default)]
    bin: Option<String>,
    #[serde(default)]
    requires: Vec<Requirement>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    homepage: String,
}

/// All known packages, keyed by normalized name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    packages: BTreeMap<PackageName, PackageSpec>,
}

impl Registry {
    /// Parse a registry from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the TOML is malformed, a key is not a
    /// valid package name, two keys collide after normalization, or an entry
    /// has an empty URL, a `bin` that is not a plain file name, or a `copy`
    /// step that leaves the working tree.
    pub fn parse(content: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(content)?;
        let mut packages = BTreeMap::new();

        for (key, entry) in file.packages {
            let name = PackageName::parse(&key)
                .map_err(|source| RegistryError::InvalidName { key, source })?;
            if entry.url.trim().is_empty() {
                return Err(RegistryError::MissingUrl(name));
            }
            if packages.contains_key(&name) {
                return Err(RegistryError::Duplicate(name));
            }

            let bin = entry.bin.unwrap_or_else(|| name.to_string());
            if !is_plain_file_name(&bin) {
                return Err(RegistryError::InvalidBin { name, bin });
            }
            if let BuildPlan::Explicit(steps) = &entry.build {
                for step in steps {
                    if let BuildStep::Copy { copy } = step
                        && !is_inside_tree(copy)
                    {
                        return Err(RegistryError::UnsafeCopy {
                            name,
                            path: copy.clone(),
                        });
                    }
                }
            }

            let spec = PackageSpec {
                bin,
                name: name.clone(),
                url: entry.url,
                build: entry.build,
                requires: entry.requires,
                description: entry.description,
                homepage: entry.homepage,
            };
            packages.insert(name, spec);
        }

        Ok(Self { packages })
    }

    /// Parse a registry from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] if the file cannot be read, or any error
    /// from [`Registry::parse`].
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Overlay `other` on top of this registry. Entries in `other` replace
    /// entries with the same name.
    pub fn merge(&mut self, other: Registry) {
        self.packages.extend(other.packages);
    }

    /// Look up a package by raw user input, normalizing it first.
    pub fn find(&self, name: &str) -> Option<&PackageSpec> {
        PackageName::parse(name)
            .ok()
            .and_then(|n| self.packages.get(&n))
    }

    /// Number of known packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the registry has no packages.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

fn is_plain_file_name(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

/// Relative, no `..`, and names at least one file.
fn is_inside_tree(s: &str) -> bool {
    let path = Path::new(s);
    !s.contains('\\')
        && path.components().any(|c| matches!(c, Component::Normal(_)))
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
