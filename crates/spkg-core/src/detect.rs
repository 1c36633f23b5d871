//! Build-system detection.
//!
//! Marker files are checked in a fixed precedence order and the first match
//! wins. A tree may legitimately carry several markers (a CMake project that
//! vendors a Makefile-based dependency, an autotools project that also ships
//! a `configure`), so the order is part of the contract:
//!
//! 1. `GNUmakefile`, `makefile`, `Makefile`
//! 2. `configure`
//! 3. `autogen.sh`
//! 4. `CMakeLists.txt`
//! 5. `setup.py`, `pyproject.toml`
//! 6. `Cargo.toml`
//! 7. `go.mod`
//! 8. `gradlew`, `build.gradle`, `build.gradle.kts`, `settings.gradle`,
//!    `settings.gradle.kts`

use std::path::Path;

use crate::strategy::BuildStrategy;

const MAKEFILES: &[&str] = &["GNUmakefile", "makefile", "Makefile"];
const PYTHON_MARKERS: &[&str] = &["setup.py", "pyproject.toml"];
const GRADLE_MARKERS: &[&str] = &[
    "gradlew",
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
];

/// Inspect `dir` and select exactly one build strategy.
///
/// Returns [`BuildStrategy::Unrecognized`] when no marker is present; the
/// caller treats that as a build failure.
pub fn detect(dir: &Path) -> BuildStrategy {
    let has = |marker: &str| dir.join(marker).is_file();

    let strategy = if let Some(makefile) = MAKEFILES.iter().find(|m| has(m)) {
        BuildStrategy::Makefile {
            install_target: has_install_target(&dir.join(makefile)),
        }
    } else if has("configure") {
        BuildStrategy::Configure
    } else if has("autogen.sh") {
        BuildStrategy::Autogen
    } else if has("CMakeLists.txt") {
        BuildStrategy::CMake
    } else if PYTHON_MARKERS.iter().any(|m| has(m)) {
        BuildStrategy::SetupPy
    } else if has("Cargo.toml") {
        BuildStrategy::Cargo
    } else if has("go.mod") {
        BuildStrategy::GoModule
    } else if GRADLE_MARKERS.iter().any(|m| has(m)) {
        BuildStrategy::Gradle {
            wrapper: has("gradlew"),
        }
    } else {
        BuildStrategy::Unrecognized
    };

    tracing::debug!("Detected {strategy:?} in {}", dir.display());
    strategy
}

/// Whether a Makefile defines an `install` target.
///
/// Matches a line that literally starts with `install:`. Targets declared
/// through variables or pattern rules are not recognised.
fn has_install_target(makefile: &Path) -> bool {
    match std::fs::read(makefile) {
        Ok(bytes) => String::from_utf8_lossy(&bytes)
            .lines()
            .any(|line| line.starts_with("install:")),
        Err(e) => {
            tracing::warn!("Could not read {}: {e}", makefile.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tree(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_single_marker_selects_its_system() {
        let cases: &[(&str, BuildStrategy)] = &[
            (
                "Makefile",
                BuildStrategy::Makefile {
                    install_target: false,
                },
            ),
            ("configure", BuildStrategy::Configure),
            ("autogen.sh", BuildStrategy::Autogen),
            ("CMakeLists.txt", BuildStrategy::CMake),
            ("setup.py", BuildStrategy::SetupPy),
            ("pyproject.toml", BuildStrategy::SetupPy),
            ("Cargo.toml", BuildStrategy::Cargo),
            ("go.mod", BuildStrategy::GoModule),
            ("gradlew", BuildStrategy::Gradle { wrapper: true }),
            ("build.gradle", BuildStrategy::Gradle { wrapper: false }),
            ("build.gradle.kts", BuildStrategy::Gradle { wrapper: false }),
        ];

        for (marker, expected) in cases {
            let dir = tree(&[(*marker, "")]);
            assert_eq!(&detect(dir.path()), expected, "marker {marker}");
        }
    }

    #[test]
    fn test_makefile_wins_over_cmake() {
        let dir = tree(&[("CMakeLists.txt", ""), ("Makefile", "all:\n\tcc main.c\n")]);
        assert_eq!(
            detect(dir.path()),
            BuildStrategy::Makefile {
                install_target: false
            }
        );
    }

    #[test]
    fn test_precedence_chain() {
        let dir = tree(&[("configure", ""), ("autogen.sh", ""), ("CMakeLists.txt", "")]);
        assert_eq!(detect(dir.path()), BuildStrategy::Configure);

        let dir = tree(&[("Cargo.toml", ""), ("go.mod", ""), ("build.gradle", "")]);
        assert_eq!(detect(dir.path()), BuildStrategy::Cargo);

        let dir = tree(&[("go.mod", ""), ("gradlew", "")]);
        assert_eq!(detect(dir.path()), BuildStrategy::GoModule);
    }

    #[test]
    fn test_install_target_detection() {
        let dir = tree(&[(
            "Makefile",
            "PREFIX ?= /usr\nall:\n\ttrue\ninstall: all\n\tcp x $(PREFIX)/bin\n",
        )]);
        assert_eq!(
            detect(dir.path()),
            BuildStrategy::Makefile {
                install_target: true
            }
        );

        // Indented or mentioned-only does not count.
        let dir = tree(&[("Makefile", "all:\n\t@echo run make install:\n  install:\n")]);
        assert_eq!(
            detect(dir.path()),
            BuildStrategy::Makefile {
                install_target: false
            }
        );
    }

    #[test]
    fn test_gnumakefile_is_a_makefile() {
        let dir = tree(&[("GNUmakefile", "install:\n")]);
        assert_eq!(
            detect(dir.path()),
            BuildStrategy::Makefile {
                install_target: true
            }
        );
    }

    #[test]
    fn test_no_marker_is_unrecognized() {
        let dir = tree(&[("README.md", "# hello"), ("src/main.c", "int main(){}")]);
        assert_eq!(detect(dir.path()), BuildStrategy::Unrecognized);

        let empty = tempdir().unwrap();
        assert_eq!(detect(empty.path()), BuildStrategy::Unrecognized);
    }

    #[test]
    fn test_marker_directory_is_ignored() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Makefile")).unwrap();
        std::fs::write(dir.path().join("go.mod"), "module x").unwrap();
        assert_eq!(detect(dir.path()), BuildStrategy::GoModule);
    }
}
