//! Installed-package ledger
//!
//! Records which packages have been installed at least once. Stored as JSON at
//! `<home>/installed.json` and rewritten whole on every change through a
//! temporary file and rename, so a crash mid-write leaves the old ledger.
//! Concurrent installs of different packages serialize their read-modify-write
//! through [`Ledger::record`].

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spkg_core::lock::{LockError, PackageLock};
use spkg_schema::PackageName;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to access ledger {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ledger {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// One installed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub first_installed: DateTime<Utc>,
    pub last_installed: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    packages: BTreeMap<PackageName, LedgerEntry>,
}

/// In-memory ledger bound to its file.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    file: LedgerFile,
}

impl Ledger {
    /// Load the ledger, or start empty if the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let file = match std::fs::read(path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| LedgerError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerFile::default(),
            Err(source) => {
                return Err(LedgerError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Add `name` to the ledger at `path` under the exclusive lock at
    /// `lock_path`, so rewrites from concurrent installs never drop entries.
    pub fn record(
        path: &Path,
        lock_path: &Path,
        name: &PackageName,
        artifact: Option<&Path>,
    ) -> Result<(), LedgerError> {
        let _guard = PackageLock::wait(lock_path)?;
        let mut ledger = Self::load(path)?;
        ledger.add(name, artifact);
        ledger.save()
    }

    pub fn contains(&self, name: &PackageName) -> bool {
        self.file.packages.contains_key(name)
    }

    pub fn get(&self, name: &PackageName) -> Option<&LedgerEntry> {
        self.file.packages.get(name)
    }

    /// Installed packages in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&PackageName, &LedgerEntry)> {
        self.file.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.file.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.packages.is_empty()
    }

    /// Mark `name` installed now. Adding a name that is already present keeps
    /// its first install time and refreshes the rest.
    pub fn add(&mut self, name: &PackageName, artifact: Option<&Path>) {
        let now = Utc::now();
        let artifact = artifact.map(Path::to_path_buf);
        self.file
            .packages
            .entry(name.clone())
            .and_modify(|e| {
                e.last_installed = now;
                e.artifact.clone_from(&artifact);
            })
            .or_insert_with(|| LedgerEntry {
                first_installed: now,
                last_installed: now,
                artifact,
            });
    }

    /// Write the ledger back to disk atomically.
    pub fn save(&self) -> Result<(), LedgerError> {
        let io_err = |source: std::io::Error| LedgerError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let json = serde_json::to_vec_pretty(&self.file).map_err(|source| {
            LedgerError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn name(s: &str) -> PackageName {
        PackageName::parse(s).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = tempdir().unwrap();
        let ledger = Ledger::load(&tmp.path().join("installed.json")).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.contains(&name("jq")));
    }

    #[test]
    fn test_add_is_idempotent() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("installed.json");
        let mut ledger = Ledger::load(&path).unwrap();

        ledger.add(&name("jq"), Some(Path::new("/h/bin/jq")));
        let first = ledger.get(&name("jq")).unwrap().first_installed;
        ledger.add(&name("jq"), Some(Path::new("/h/bin/jq")));

        assert_eq!(ledger.len(), 1);
        let entry = ledger.get(&name("jq")).unwrap();
        assert_eq!(entry.first_installed, first);
        assert!(entry.last_installed >= first);
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("state/installed.json");

        let mut ledger = Ledger::load(&path).unwrap();
        ledger.add(&name("sl"), Some(Path::new("/h/bin/sl")));
        ledger.add(&name("fzf"), None);
        ledger.save().unwrap();

        let reloaded = Ledger::load(&path).unwrap();
        let names: Vec<&str> = reloaded.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["fzf", "sl"]);
        assert_eq!(
            reloaded.get(&name("sl")).unwrap().artifact.as_deref(),
            Some(Path::new("/h/bin/sl"))
        );

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["packages"]["sl"]["first_installed"].is_string());
        assert!(raw["packages"]["fzf"].get("artifact").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_concurrent_records_keep_every_entry() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("installed.json");
        let lock = tmp.path().join("locks/.ledger.lock");

        let handles: Vec<_> = ["alpha", "beta", "gamma", "delta"]
            .into_iter()
            .map(|pkg| {
                let (path, lock) = (path.clone(), lock.clone());
                std::thread::spawn(move || Ledger::record(&path, &lock, &name(pkg), None))
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }

        let ledger = Ledger::load(&path).unwrap();
        let names: Vec<&str> = ledger.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "delta", "gamma"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_record_waits_for_ledger_lock() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("installed.json");
        let lock = tmp.path().join("locks/.ledger.lock");

        // Another install is midway through its rewrite.
        let held = PackageLock::acquire(&lock).unwrap();
        let mut other = Ledger::load(&path).unwrap();

        let writer = {
            let (path, lock) = (path.clone(), lock.clone());
            std::thread::spawn(move || Ledger::record(&path, &lock, &name("beta"), None))
        };
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(!writer.is_finished());

        other.add(&name("alpha"), None);
        other.save().unwrap();
        drop(held);
        writer.join().unwrap().unwrap();

        let ledger = Ledger::load(&path).unwrap();
        assert!(ledger.contains(&name("alpha")));
        assert!(ledger.contains(&name("beta")));
    }

    #[test]
    fn test_corrupt_ledger_is_an_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("installed.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Ledger::load(&path),
            Err(LedgerError::Corrupt { .. })
        ));
    }
}
