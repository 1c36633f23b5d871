use dirs::home_dir;
use std::path::{Path, PathBuf};

use spkg_schema::PackageName;

/// Returns the managed home directory, or None if the user's home cannot be resolved.
///
/// `SPKG_HOME` takes precedence over `~/.spkg`.
pub fn try_spkg_home() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os("SPKG_HOME") {
        if !val.is_empty() {
            return Some(PathBuf::from(val));
        }
    }
    home_dir().map(|h| h.join(".spkg"))
}

/// Filesystem layout under the managed home directory.
///
/// Every component receives one of these explicitly; nothing in the engine
/// reads the process working directory.
///
/// ```text
/// <home>/
/// ├── bin/            # Binaries and launchers (on PATH)
/// ├── src/<name>/     # Working trees
/// ├── logs/           # Build logs
/// ├── locks/          # Per-package advisory locks
/// ├── config.toml
/// ├── registry.toml   # User registry overlay
/// └── installed.json  # Ledger
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    home: PathBuf,
}

impl Paths {
    /// Use `home` as the managed home directory.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Resolve the managed home from the environment.
    pub fn from_env() -> Option<Self> {
        try_spkg_home().map(Self::new)
    }

    /// Managed home directory, also the install prefix.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Binary installation target: `<home>/bin`
    pub fn bin_dir(&self) -> PathBuf {
        self.home.join("bin")
    }

    /// Working tree root: `<home>/src`
    pub fn src_dir(&self) -> PathBuf {
        self.home.join("src")
    }

    /// Working tree for a single package: `<home>/src/<name>`
    pub fn working_tree(&self, name: &PackageName) -> PathBuf {
        self.src_dir().join(name)
    }

    /// Logs directory: `<home>/logs`
    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Lock directory: `<home>/locks`
    pub fn lock_dir(&self) -> PathBuf {
        self.home.join("locks")
    }

    /// Advisory lock file for a package: `<home>/locks/<name>.lock`
    pub fn lock_path(&self, name: &PackageName) -> PathBuf {
        self.lock_dir().join(format!("{name}.lock"))
    }

    /// Ledger path: `<home>/installed.json`
    pub fn ledger_path(&self) -> PathBuf {
        self.home.join("installed.json")
    }

    /// Lock serializing ledger rewrites: `<home>/locks/.ledger.lock`
    ///
    /// Package names cannot start with `.`, so this never collides with a
    /// package lock.
    pub fn ledger_lock_path(&self) -> PathBuf {
        self.lock_dir().join(".ledger.lock")
    }

    /// Configuration file: `<home>/config.toml`
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// User registry overlay: `<home>/registry.toml`
    pub fn registry_path(&self) -> PathBuf {
        self.home.join("registry.toml")
    }

    /// Generate a build log path for a package
    pub fn build_log_path(&self, package: &PackageName) -> PathBuf {
        let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        self.log_dir()
            .join(format!("build-{package}-{timestamp}.log"))
    }
}
