//! Registry assembly.
//!
//! Layers, lowest first: the built-in table compiled into the binary, the
//! user's `<home>/registry.toml`, then an explicit `--registry` file. Later
//! layers replace earlier entries with the same name.

use std::path::Path;

use spkg_core::Paths;
use spkg_schema::{Registry, RegistryError};

const BUILTIN_REGISTRY: &str = include_str!("../registry.toml");

/// The registry compiled into the binary.
pub fn builtin() -> Result<Registry, RegistryError> {
    Registry::parse(BUILTIN_REGISTRY)
}

/// Load the effective registry.
///
/// A missing user registry is fine; a missing `--registry` file is an error.
pub fn load(paths: &Paths, extra: Option<&Path>) -> Result<Registry, RegistryError> {
    let mut registry = builtin()?;

    let user = paths.registry_path();
    if user.exists() {
        tracing::debug!("Loading user registry {}", user.display());
        registry.merge(Registry::from_file(&user)?);
    }

    if let Some(extra) = extra {
        tracing::debug!("Loading registry {}", extra.display());
        registry.merge(Registry::from_file(extra)?);
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spkg_schema::BuildPlan;

    #[test]
    fn test_builtin_registry_parses() {
        let registry = builtin().unwrap();
        assert!(!registry.is_empty());

        let rg = registry.find("ripgrep").unwrap();
        assert_eq!(rg.bin, "rg");
        assert!(rg.build.is_auto());

        let sl = registry.find("sl").unwrap();
        assert!(matches!(sl.build, BuildPlan::Explicit(_)));
        assert!(sl.os_packages().any(|p| p == "clang"));
    }

    #[test]
    fn test_user_registry_overrides_builtin() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::new(home.path());
        std::fs::write(
            paths.registry_path(),
            "[packages.jq]\nurl = \"https://example.invalid/my-jq\"\n\n[packages.hello]\nurl = \"https://example.invalid/hello\"\n",
        )
        .unwrap();

        let registry = load(&paths, None).unwrap();
        assert_eq!(
            registry.find("jq").unwrap().url,
            "https://example.invalid/my-jq"
        );
        assert!(registry.find("hello").is_some());
        assert!(registry.find("fzf").is_some());
    }

    #[test]
    fn test_explicit_registry_must_exist() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::new(home.path());
        let err = load(&paths, Some(&home.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
    }
}
