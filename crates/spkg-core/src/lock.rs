//! Per-package advisory locks.
//!
//! Two installs of the same package would share one working tree and one
//! binary path. The orchestrator holds an exclusive, non-blocking `flock` on
//! `<home>/locks/<name>.lock` for the whole sync/build/publish sequence; the
//! lock file holds the owner's PID so the loser can say who it lost to.
//! The kernel drops the lock when the holder exits, so a crash never leaves a
//! stale lock behind.
//!
//! Short critical sections shared by every package (the ledger rewrite) use
//! [`PackageLock::wait`] instead, which blocks until the lock is free.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from [`PackageLock::acquire`].
#[derive(Error, Debug)]
pub enum LockError {
    /// Another process holds the lock.
    #[error("{} is locked by another spkg process{}", .path.display(), pid_suffix(.pid))]
    Contention {
        /// Holder's PID, when the lock file could be read.
        pid: Option<u32>,
        /// Lock file.
        path: PathBuf,
    },

    /// The lock file could not be created or locked.
    #[error("Failed to lock {}: {source}", .path.display())]
    Io {
        /// Lock file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

fn pid_suffix(pid: &Option<u32>) -> String {
    pid.map(|p| format!(" (PID {p})")).unwrap_or_default()
}

/// A held package lock; released on drop.
#[derive(Debug)]
pub struct PackageLock {
    _file: File,
    path: PathBuf,
}

impl PackageLock {
    /// Take the lock at `path` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Contention`] if another process holds it and
    /// [`LockError::Io`] for filesystem failures.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        Self::lock(path, false)
    }

    /// Take the lock at `path`, blocking until the current holder releases it.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Io`] for filesystem failures.
    pub fn wait(path: &Path) -> Result<Self, LockError> {
        Self::lock(path, true)
    }

    fn lock(path: &Path, block: bool) -> Result<Self, LockError> {
        let io_err = |source: io::Error| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        if let Err(e) = lock_exclusive(&file, block) {
            if e.kind() == io::ErrorKind::WouldBlock {
                return Err(LockError::Contention {
                    pid: read_pid(&mut file),
                    path: path.to_path_buf(),
                });
            }
            return Err(io_err(e));
        }

        file.set_len(0).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        writeln!(file, "{}", std::process::id()).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        tracing::debug!("Acquired {}", path.display());
        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    /// Lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

#[cfg(unix)]
fn lock_exclusive(file: &File, block: bool) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let op = if block {
        libc::LOCK_EX
    } else {
        libc::LOCK_EX | libc::LOCK_NB
    };
    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    #[allow(unsafe_code)]
    let ret = unsafe { libc::flock(file.as_raw_fd(), op) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File, _block: bool) -> io::Result<()> {
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_writes_pid() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("locks/jq.lock");

        let lock = PackageLock::acquire(&path).unwrap();
        assert_eq!(lock.path(), path);
        let pid: u32 = fs::read_to_string(&path).unwrap().trim().parse().unwrap();
        assert_eq!(pid, std::process::id());
    }

    #[test]
    fn test_second_acquire_is_contention() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("jq.lock");

        let _held = PackageLock::acquire(&path).unwrap();
        // flock locks belong to the open file description, so a second open
        // in the same process conflicts just like another process would.
        let err = PackageLock::acquire(&path).unwrap_err();
        match err {
            LockError::Contention { pid, .. } => assert_eq!(pid, Some(std::process::id())),
            other => panic!("expected contention, got {other}"),
        }
    }

    #[test]
    fn test_drop_releases() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("jq.lock");

        drop(PackageLock::acquire(&path).unwrap());
        assert!(PackageLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_wait_blocks_until_release() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("shared.lock");
        let held = PackageLock::acquire(&path).unwrap();

        let waiter = {
            let path = path.clone();
            std::thread::spawn(move || PackageLock::wait(&path).map(|_| ()))
        };
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(!waiter.is_finished());

        drop(held);
        waiter.join().unwrap().unwrap();
    }

    #[test]
    fn test_different_packages_do_not_conflict() {
        let tmp = tempdir().unwrap();
        let _a = PackageLock::acquire(&tmp.path().join("a.lock")).unwrap();
        assert!(PackageLock::acquire(&tmp.path().join("b.lock")).is_ok());
    }
}
