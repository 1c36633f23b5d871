//! Package records as held by the registry.
//!
//! A [`PackageSpec`] is immutable once loaded. The build plan is either
//! [`BuildPlan::Auto`], which hands the working tree to build-system
//! detection, or an explicit list of structured [`BuildStep`]s. Explicit
//! steps never go through a shell: each one is a program plus an argument
//! vector.

use serde::{Deserialize, Serialize};

use crate::types::PackageName;

/// A single program invocation: program name plus arguments.
///
/// Serialized as a flat array, program first: `["make", "-j4"]`.
///
/// Arguments may contain placeholders that are substituted right before the
/// step runs:
///
/// | Placeholder | Value |
/// |---|---|
/// | `{prefix}` | Managed home directory (install prefix) |
/// | `{bin}` | Managed binary directory |
/// | `{src}` | The package's working tree |
/// | `{jobs}` | Parallel job count |
/// | `{name}` | Expected artifact name |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Invocation {
    /// Program to execute, resolved through `PATH` or relative to the working tree.
    pub program: String,
    /// Arguments passed verbatim (after placeholder expansion).
    pub args: Vec<String>,
}

impl Invocation {
    /// Build an invocation from a program and its arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Return a copy with every `{key}` placeholder replaced by its value.
    ///
    /// Unknown placeholders are left untouched.
    pub fn expand(&self, vars: &[(&str, &str)]) -> Self {
        let subst = |s: &str| {
            vars.iter().fold(s.to_string(), |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), value)
            })
        };
        Self {
            program: subst(&self.program),
            args: self.args.iter().map(|a| subst(a)).collect(),
        }
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl TryFrom<Vec<String>> for Invocation {
    type Error = String;

    fn try_from(mut parts: Vec<String>) -> Result<Self, Self::Error> {
        if parts.is_empty() || parts[0].trim().is_empty() {
            return Err("build step must name a program".to_string());
        }
        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
        })
    }
}

impl From<Invocation> for Vec<String> {
    fn from(inv: Invocation) -> Self {
        std::iter::once(inv.program).chain(inv.args).collect()
    }
}

/// One step of a build sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildStep {
    /// Copy a file from the working tree into the managed binary directory,
    /// renamed to the package's expected artifact name.
    Copy {
        /// Path relative to the working tree.
        copy: String,
    },
    /// Run a program inside the working tree.
    Run(Invocation),
}

impl BuildStep {
    /// Shorthand for a [`BuildStep::Run`] step.
    pub fn run<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Run(Invocation::new(program, args))
    }
}

impl std::fmt::Display for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy { copy } => write!(f, "copy {copy}"),
            Self::Run(inv) => write!(f, "{inv}"),
        }
    }
}

/// How a package gets built.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawPlan", into = "RawPlan")]
pub enum BuildPlan {
    /// Inspect the working tree and pick a build system automatically.
    #[default]
    Auto,
    /// Run these steps in order, stopping at the first failure.
    Explicit(Vec<BuildStep>),
}

impl BuildPlan {
    /// Whether this plan defers to build-system detection.
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawPlan {
    Keyword(String),
    Steps(Vec<BuildStep>),
}

impl TryFrom<RawPlan> for BuildPlan {
    type Error = String;

    fn try_from(raw: RawPlan) -> Result<Self, Self::Error> {
        match raw {
            RawPlan::Keyword(k) if k == "auto" => Ok(Self::Auto),
            RawPlan::Keyword(k) => Err(format!(
                "unknown build plan '{k}': expected \"auto\" or a list of steps"
            )),
            RawPlan::Steps(steps) if steps.is_empty() => {
                Err("explicit build plan has no steps".to_string())
            }
            RawPlan::Steps(steps) => Ok(Self::Explicit(steps)),
        }
    }
}

impl From<BuildPlan> for RawPlan {
    fn from(plan: BuildPlan) -> Self {
        match plan {
            BuildPlan::Auto => Self::Keyword("auto".to_string()),
            BuildPlan::Explicit(steps) => Self::Steps(steps),
        }
    }
}

/// A host tool a package needs, paired with the OS package that provides it.
///
/// In TOML either a bare string (`"make"`, tool and package share the name)
/// or a table (`{ tool = "cc", package = "clang" }`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawRequirement")]
pub struct Requirement {
    /// Command name probed on `PATH`.
    pub tool: String,
    /// OS package installed when the tool is missing.
    pub package: String,
}

impl Requirement {
    /// A requirement whose tool and OS package have different names.
    pub fn new(tool: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            package: package.into(),
        }
    }

    /// A requirement whose tool and OS package share a name.
    pub fn same(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            tool: name.clone(),
            package: name,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRequirement {
    Name(String),
    Pair { tool: String, package: String },
}

impl From<RawRequirement> for Requirement {
    fn from(raw: RawRequirement) -> Self {
        match raw {
            RawRequirement::Name(n) => Self::same(n),
            RawRequirement::Pair { tool, package } => Self { tool, package },
        }
    }
}

/// An immutable registry record describing one installable package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Registry key; also the working tree and lock file name.
    pub name: PackageName,
    /// Git repository URL.
    pub url: String,
    /// Build plan (auto-detected or explicit).
    pub build: BuildPlan,
    /// File name of the expected binary or launcher in the managed bin directory.
    pub bin: String,
    /// Host tools required before fetching and building.
    pub requires: Vec<Requirement>,
    /// One-line summary shown by `spkg info`.
    pub description: String,
    /// Project homepage shown by `spkg info`.
    pub homepage: String,
}

impl PackageSpec {
    /// Names of the required host tools.
    pub fn tools(&self) -> impl Iterator<Item = &str> {
        self.requires.iter().map(|r| r.tool.as_str())
    }

    /// Names of the OS packages that satisfy [`Self::tools`], in the same order.
    pub fn os_packages(&self) -> impl Iterator<Item = &str> {
        self.requires.iter().map(|r| r.package.as_str())
    }
}
