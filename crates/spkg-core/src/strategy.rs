//! Build strategies: one per supported build system, plus explicit
//! registry-supplied sequences.
//!
//! A strategy is produced fresh for every build attempt (by
//! [`crate::detect::detect`] or from the registry) and is never persisted. It
//! carries two things the rest of the pipeline needs:
//!
//! - the step sequence, as [`BuildStep`] templates whose placeholders the
//!   build driver expands (see [`spkg_schema::Invocation`]);
//! - the artifact search plan, telling the locator where output lands for
//!   this ecosystem.

use spkg_schema::{BuildStep, Requirement};

use crate::config::Config;

/// How to build a working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStrategy {
    /// A Makefile. With an `install:` target the build installs into the
    /// managed prefix; without one the output is left in the tree.
    Makefile {
        /// Whether the Makefile defines an `install` target.
        install_target: bool,
    },
    /// An autoconf `configure` script.
    Configure,
    /// An `autogen.sh` bootstrap followed by configure.
    Autogen,
    /// A `CMakeLists.txt` project.
    CMake,
    /// A Python project (`setup.py` or `pyproject.toml`).
    SetupPy,
    /// A Cargo project.
    Cargo,
    /// A Go module.
    GoModule,
    /// A Gradle project.
    Gradle {
        /// Whether the tree ships a `gradlew` wrapper script.
        wrapper: bool,
    },
    /// Steps taken verbatim from the registry.
    Explicit(Vec<BuildStep>),
    /// No recognised build marker.
    Unrecognized,
}

/// Base directory of a search root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchBase {
    /// The managed binary directory.
    Bin,
    /// The working tree, optionally a relative subdirectory of it.
    Tree(Option<String>),
}

/// One place the locator looks for the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRoot {
    /// Where to look.
    pub base: SearchBase,
    /// Only accept a file with the exact expected name.
    pub exact_only: bool,
}

impl SearchRoot {
    fn bin() -> Self {
        Self {
            base: SearchBase::Bin,
            exact_only: true,
        }
    }

    fn tree() -> Self {
        Self {
            base: SearchBase::Tree(None),
            exact_only: false,
        }
    }

    fn tree_sub(sub: impl Into<String>) -> Self {
        Self {
            base: SearchBase::Tree(Some(sub.into())),
            exact_only: false,
        }
    }
}

/// Where the artifact should be looked for after a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSearch {
    /// Try each root in order with the generic locator.
    Roots(Vec<SearchRoot>),
    /// Look for a packaged archive first, then fall back to these roots.
    Gradle(Vec<SearchRoot>),
}

impl BuildStrategy {
    /// Short identifier for messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Makefile { .. } => "make",
            Self::Configure => "configure",
            Self::Autogen => "autogen",
            Self::CMake => "cmake",
            Self::SetupPy => "setup.py",
            Self::Cargo => "cargo",
            Self::GoModule => "go",
            Self::Gradle { .. } => "gradle",
            Self::Explicit(_) => "explicit",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Whether this strategy can be run at all.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized)
    }

    /// The step templates for this strategy.
    pub fn steps(&self) -> Vec<BuildStep> {
        let make = || BuildStep::run("make", ["-j{jobs}"]);
        let configure = || BuildStep::run("sh", ["./configure", "--prefix={prefix}"]);

        match self {
            Self::Makefile {
                install_target: true,
            } => vec![make(), BuildStep::run("make", ["install", "PREFIX={prefix}"])],
            Self::Makefile {
                install_target: false,
            } => vec![make()],
            Self::Configure => vec![configure(), make(), BuildStep::run("make", ["install"])],
            Self::Autogen => vec![
                BuildStep::run("sh", ["autogen.sh"]),
                configure(),
                make(),
                BuildStep::run("make", ["install"]),
            ],
            Self::CMake => vec![
                BuildStep::run(
                    "cmake",
                    [
                        "-S",
                        ".",
                        "-B",
                        "build",
                        "-DCMAKE_BUILD_TYPE=Release",
                        "-DCMAKE_INSTALL_PREFIX={prefix}",
                    ],
                ),
                BuildStep::run("cmake", ["--build", "build", "--parallel", "{jobs}"]),
                BuildStep::run("cmake", ["--install", "build"]),
            ],
            Self::SetupPy => vec![BuildStep::run(
                "python3",
                ["-m", "pip", "install", "--prefix={prefix}", "."],
            )],
            Self::Cargo => vec![BuildStep::run(
                "cargo",
                ["install", "--path", ".", "--root", "{prefix}"],
            )],
            Self::GoModule => vec![BuildStep::run("go", ["build", "-o", "{name}", "."])],
            Self::Gradle { wrapper: true } => vec![BuildStep::run(
                "sh",
                ["./gradlew", "assemble", "--no-daemon", "--console=plain"],
            )],
            Self::Gradle { wrapper: false } => vec![BuildStep::run(
                "gradle",
                ["assemble", "--no-daemon", "--console=plain"],
            )],
            Self::Explicit(steps) => steps.clone(),
            Self::Unrecognized => Vec::new(),
        }
    }

    /// Where the artifact lands for this strategy.
    pub fn artifact_search(&self, expected: &str) -> ArtifactSearch {
        match self {
            // No install target: output stays in the tree.
            Self::Makefile {
                install_target: false,
            }
            | Self::GoModule => ArtifactSearch::Roots(vec![SearchRoot::tree()]),
            Self::Gradle { .. } => ArtifactSearch::Gradle(vec![
                SearchRoot::tree_sub(format!("build/install/{expected}/bin")),
                SearchRoot::tree_sub("build/bin"),
                SearchRoot::tree_sub("build/exe"),
                SearchRoot::tree_sub("build/native/nativeCompile"),
            ]),
            Self::Unrecognized => ArtifactSearch::Roots(Vec::new()),
            // Installed into the prefix, or placed there by an explicit copy
            // step; the tree is the fallback for sequences that only build.
            _ => ArtifactSearch::Roots(vec![SearchRoot::bin(), SearchRoot::tree()]),
        }
    }

    /// Host tools this strategy needs on top of the package's own requirements.
    ///
    /// Gradle needs a Java runtime, and the system `gradle` when the tree has
    /// no wrapper.
    pub fn extra_requirements(&self, config: &Config) -> Vec<Requirement> {
        match self {
            Self::Gradle { wrapper } => {
                let mut reqs = vec![Requirement::new(
                    config.java_runtime(),
                    config.java_package(),
                )];
                if !wrapper {
                    reqs.push(Requirement::new("gradle", config.gradle_package()));
                }
                reqs
            }
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
