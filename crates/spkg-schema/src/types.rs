//! Package names and sync modes.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Errors produced when validating a package name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The name is empty or only whitespace.
    #[error("Package name is empty")]
    Empty,

    /// The name contains a character that cannot appear in a directory name.
    #[error("Package name '{0}' contains an invalid character")]
    InvalidChar(String),

    /// The name starts with a dot, which would produce a hidden or relative path.
    #[error("Package name '{0}' must not start with '.'")]
    LeadingDot(String),
}

/// A normalized package name.
///
/// Package names double as directory names under `<home>/src` and as lock
/// file names, so they are restricted to characters that are safe in a single
/// path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Parse and normalize a package name (lowercased, trimmed).
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the name is empty, starts with `.`, or
    /// contains a path separator, whitespace, or a control character.
    pub fn parse(name: &str) -> Result<Self, NameError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name.starts_with('.') {
            return Err(NameError::LeadingDot(name));
        }
        if name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
        {
            return Err(NameError::InvalidChar(name));
        }
        Ok(Self(name))
    }

    /// Return the normalized name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PackageName {
    type Error = NameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.0
    }
}

impl std::str::FromStr for PackageName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<std::ffi::OsStr> for PackageName {
    fn as_ref(&self) -> &std::ffi::OsStr {
        self.0.as_ref()
    }
}

impl AsRef<std::path::Path> for PackageName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// What the source synchronizer does with a working tree that already exists.
///
/// A missing tree is always cloned, whatever the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Build from the existing tree exactly as found. No pull happens, so
    /// repeated installs rebuild whatever source was last fetched.
    #[default]
    Reuse,
    /// Pull the latest upstream changes into the existing tree before building.
    Update,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reuse => write!(f, "reuse"),
            Self::Update => write!(f, "update"),
        }
    }
}
