//! Host tool prerequisites and the OS package manager.
//!
//! [`ensure`] probes every required tool on `PATH` and asks the OS package
//! manager to install whatever is missing. It is best effort throughout: a
//! failed index refresh or package install is reported and recorded but never
//! aborts the install. If a tool really is unavailable the build fails later
//! with a clearer message than we could give here.

use std::fmt;
use std::process::{Command, Stdio};

use serde::Deserialize;
use spkg_schema::Requirement;

use crate::reporter::Reporter;

/// Checks whether a command is reachable.
pub trait ToolProbe {
    /// Whether `tool` resolves on `PATH`.
    fn is_available(&self, tool: &str) -> bool;
}

/// Probes with a real `PATH` lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhichProbe;

impl ToolProbe for WhichProbe {
    fn is_available(&self, tool: &str) -> bool {
        let found = which::which(tool).is_ok();
        tracing::debug!("Probe {tool}: {}", if found { "found" } else { "missing" });
        found
    }
}

/// Supported OS package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    /// Termux `pkg`.
    Pkg,
    /// Debian/Ubuntu `apt-get`.
    Apt,
    /// Alpine `apk`.
    Apk,
    /// Fedora `dnf`.
    Dnf,
    /// Arch `pacman`.
    Pacman,
    /// Homebrew.
    Brew,
}

impl PackageManagerKind {
    /// Auto-detection order.
    pub const ALL: [Self; 6] = [
        Self::Pkg,
        Self::Apt,
        Self::Apk,
        Self::Dnf,
        Self::Pacman,
        Self::Brew,
    ];

    /// Executable invoked for this manager.
    pub fn program(self) -> &'static str {
        match self {
            Self::Pkg => "pkg",
            Self::Apt => "apt-get",
            Self::Apk => "apk",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Brew => "brew",
        }
    }

    /// Arguments that refresh the package index.
    pub fn refresh_args(self) -> &'static [&'static str] {
        match self {
            Self::Pkg | Self::Apt => &["update", "-y"],
            Self::Apk => &["update"],
            Self::Dnf => &["makecache"],
            Self::Pacman => &["-Sy", "--noconfirm"],
            Self::Brew => &["update"],
        }
    }

    /// Arguments that install one package, before the package name.
    pub fn install_args(self) -> &'static [&'static str] {
        match self {
            Self::Pkg | Self::Apt | Self::Dnf => &["install", "-y"],
            Self::Apk => &["add", "--no-interactive"],
            Self::Pacman => &["-S", "--needed", "--noconfirm"],
            Self::Brew => &["install"],
        }
    }

    /// First manager whose executable the probe can find.
    pub fn detect(probe: &dyn ToolProbe) -> Option<Self> {
        Self::ALL.into_iter().find(|k| probe.is_available(k.program()))
    }
}

impl fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// The OS package manager primitives.
pub trait PackageManager {
    /// Name shown in messages.
    fn name(&self) -> &str;

    /// Refresh the package index. Returns whether it succeeded.
    fn refresh_index(&self) -> bool;

    /// Install one package. Returns whether it succeeded.
    fn install(&self, package: &str) -> bool;
}

/// Runs a real package manager executable.
#[derive(Debug, Clone, Copy)]
pub struct CommandPackageManager {
    kind: PackageManagerKind,
}

impl CommandPackageManager {
    /// Wrap a specific manager.
    pub fn new(kind: PackageManagerKind) -> Self {
        Self { kind }
    }

    fn run(&self, args: &[&str]) -> bool {
        tracing::debug!("Running {} {}", self.kind.program(), args.join(" "));
        match Command::new(self.kind.program())
            .args(args)
            .stdin(Stdio::null())
            .status()
        {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::warn!("Could not run {}: {e}", self.kind.program());
                false
            }
        }
    }
}

impl PackageManager for CommandPackageManager {
    fn name(&self) -> &str {
        self.kind.program()
    }

    fn refresh_index(&self) -> bool {
        self.run(self.kind.refresh_args())
    }

    fn install(&self, package: &str) -> bool {
        let mut args = self.kind.install_args().to_vec();
        args.push(package);
        self.run(&args)
    }
}

/// Stand-in when no package manager could be found: every operation fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailablePackageManager;

impl PackageManager for UnavailablePackageManager {
    fn name(&self) -> &str {
        "none"
    }

    fn refresh_index(&self) -> bool {
        false
    }

    fn install(&self, _package: &str) -> bool {
        false
    }
}

/// Pick the configured manager, or the first one found on `PATH`.
pub fn system_package_manager(
    configured: Option<PackageManagerKind>,
    probe: &dyn ToolProbe,
) -> Box<dyn PackageManager> {
    match configured.or_else(|| PackageManagerKind::detect(probe)) {
        Some(kind) => Box::new(CommandPackageManager::new(kind)),
        None => {
            tracing::debug!("No OS package manager found on PATH");
            Box::new(UnavailablePackageManager)
        }
    }
}

/// What [`ensure`] found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsureReport {
    /// Tools that were absent when probed.
    pub missing: Vec<String>,
    /// OS packages installed successfully.
    pub installed: Vec<String>,
    /// OS packages whose install failed.
    pub failed: Vec<String>,
}

impl EnsureReport {
    /// Whether some prerequisite could not be installed.
    pub fn is_partial_failure(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Make sure every required tool is present, installing the missing ones.
///
/// Duplicate requirements are probed once. The index is refreshed only when
/// something is missing.
pub fn ensure(
    requirements: &[Requirement],
    probe: &dyn ToolProbe,
    manager: &dyn PackageManager,
    reporter: &dyn Reporter,
) -> EnsureReport {
    let mut report = EnsureReport::default();
    let mut packages: Vec<&str> = Vec::new();

    for req in requirements {
        if report.missing.contains(&req.tool) || probe.is_available(&req.tool) {
            continue;
        }
        report.missing.push(req.tool.clone());
        if !packages.contains(&req.package.as_str()) {
            packages.push(&req.package);
        }
    }

    if packages.is_empty() {
        return report;
    }

    reporter.info(&format!(
        "Missing tools: {}. Installing with {}",
        report.missing.join(", "),
        manager.name()
    ));

    if !manager.refresh_index() {
        tracing::warn!("Package index refresh failed");
        reporter.warning("Package index refresh failed, trying installs anyway");
    }

    for package in packages {
        if manager.install(package) {
            report.installed.push(package.to_string());
        } else {
            tracing::warn!("Failed to install OS package {package}");
            report.failed.push(package.to_string());
        }
    }

    if report.is_partial_failure() {
        reporter.warning(&format!(
            "Could not install: {}. Continuing, the build may fail",
            report.failed.join(", ")
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use std::cell::RefCell;
    use std::collections::HashSet;

    struct FakeProbe(HashSet<&'static str>);

    impl ToolProbe for FakeProbe {
        fn is_available(&self, tool: &str) -> bool {
            self.0.contains(tool)
        }
    }

    #[derive(Default)]
    struct FakeManager {
        refreshed: RefCell<usize>,
        installed: RefCell<Vec<String>>,
        broken: Vec<&'static str>,
    }

    impl PackageManager for FakeManager {
        fn name(&self) -> &str {
            "fake"
        }
        fn refresh_index(&self) -> bool {
            *self.refreshed.borrow_mut() += 1;
            true
        }
        fn install(&self, package: &str) -> bool {
            self.installed.borrow_mut().push(package.to_string());
            !self.broken.contains(&package)
        }
    }

    #[test]
    fn test_nothing_missing_does_nothing() {
        let probe = FakeProbe(["git", "make"].into());
        let manager = FakeManager::default();
        let reqs = [Requirement::same("git"), Requirement::same("make")];

        let report = ensure(&reqs, &probe, &manager, &NullReporter);
        assert_eq!(report, EnsureReport::default());
        assert_eq!(*manager.refreshed.borrow(), 0);
        assert!(manager.installed.borrow().is_empty());
    }

    #[test]
    fn test_missing_tools_install_their_packages() {
        let probe = FakeProbe(["git"].into());
        let manager = FakeManager::default();
        let reqs = [
            Requirement::same("git"),
            Requirement::new("cc", "clang"),
            Requirement::new("c++", "clang"),
            Requirement::same("make"),
        ];

        let report = ensure(&reqs, &probe, &manager, &NullReporter);
        assert_eq!(report.missing, vec!["cc", "c++", "make"]);
        assert_eq!(*manager.refreshed.borrow(), 1);
        assert_eq!(*manager.installed.borrow(), vec!["clang", "make"]);
        assert_eq!(report.installed, vec!["clang", "make"]);
        assert!(!report.is_partial_failure());
    }

    #[test]
    fn test_install_failure_is_not_fatal() {
        let probe = FakeProbe(HashSet::new());
        let manager = FakeManager {
            broken: vec!["ncurses"],
            ..Default::default()
        };
        let reqs = [Requirement::same("ncurses"), Requirement::same("cmake")];

        let report = ensure(&reqs, &probe, &manager, &NullReporter);
        assert_eq!(report.failed, vec!["ncurses"]);
        assert_eq!(report.installed, vec!["cmake"]);
        assert!(report.is_partial_failure());
    }

    #[test]
    fn test_unavailable_manager_fails_every_package() {
        let probe = FakeProbe(HashSet::new());
        let reqs = [Requirement::same("jq")];
        let report = ensure(&reqs, &probe, &UnavailablePackageManager, &NullReporter);
        assert_eq!(report.failed, vec!["jq"]);
    }

    #[test]
    fn test_detect_order() {
        let probe = FakeProbe(["apt-get", "brew"].into());
        assert_eq!(
            PackageManagerKind::detect(&probe),
            Some(PackageManagerKind::Apt)
        );

        let probe = FakeProbe(["pkg", "apt-get"].into());
        assert_eq!(
            PackageManagerKind::detect(&probe),
            Some(PackageManagerKind::Pkg)
        );

        assert_eq!(PackageManagerKind::detect(&FakeProbe(HashSet::new())), None);
    }

    #[test]
    fn test_configured_manager_wins() {
        let probe = FakeProbe(["pkg"].into());
        let manager = system_package_manager(Some(PackageManagerKind::Pacman), &probe);
        assert_eq!(manager.name(), "pacman");

        let manager = system_package_manager(None, &FakeProbe(HashSet::new()));
        assert_eq!(manager.name(), "none");
    }

    #[test]
    fn test_install_args() {
        assert_eq!(PackageManagerKind::Apt.install_args(), ["install", "-y"]);
        assert_eq!(
            PackageManagerKind::Pacman.install_args(),
            ["-S", "--needed", "--noconfirm"]
        );
    }
}
