//! Source synchronization.
//!
//! Every package has one working tree at `<home>/src/<name>`. The first
//! install makes a shallow clone; later installs either pull (update mode) or
//! take the tree exactly as it is (reuse mode).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use spkg_schema::{PackageSpec, SyncMode};
use thiserror::Error;

use crate::paths::Paths;

/// Errors that can occur while preparing a working tree.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The version control command could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Executable that failed to start.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Clone exited non-zero.
    #[error("Clone of {url} failed{}", code_suffix(.code))]
    Clone {
        /// Repository URL.
        url: String,
        /// Exit code, if any.
        code: Option<i32>,
    },

    /// Pull exited non-zero.
    #[error("Update of {} failed{}", .path.display(), code_suffix(.code))]
    Pull {
        /// Working tree.
        path: PathBuf,
        /// Exit code, if any.
        code: Option<i32>,
    },

    /// Preparing the directory failed.
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        /// Path being touched.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

fn code_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit status {c})")).unwrap_or_default()
}

/// Version control primitives.
pub trait Vcs {
    /// Shallow-clone `url` into `dest`, which does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the clone cannot run or fails.
    fn clone_shallow(&self, url: &str, dest: &Path) -> Result<(), SyncError>;

    /// Fast-forward the clone at `dir` from its upstream.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the pull cannot run or fails.
    fn pull(&self, dir: &Path) -> Result<(), SyncError>;
}

/// Drives the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl GitCli {
    /// Use `program` as the git executable.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn status(&self, cmd: &mut Command) -> Result<ExitStatus, SyncError> {
        cmd.stdin(Stdio::null())
            // Never block on a credential prompt for a mistyped URL.
            .env("GIT_TERMINAL_PROMPT", "0")
            .status()
            .map_err(|source| SyncError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl Vcs for GitCli {
    fn clone_shallow(&self, url: &str, dest: &Path) -> Result<(), SyncError> {
        tracing::debug!("git clone --depth 1 {url} {}", dest.display());
        let mut cmd = Command::new(&self.program);
        cmd.args(["clone", "--depth", "1", url]).arg(dest);
        let status = self.status(&mut cmd)?;
        if status.success() {
            Ok(())
        } else {
            Err(SyncError::Clone {
                url: url.to_string(),
                code: status.code(),
            })
        }
    }

    fn pull(&self, dir: &Path) -> Result<(), SyncError> {
        tracing::debug!("git pull in {}", dir.display());
        let mut cmd = Command::new(&self.program);
        cmd.args(["pull", "--ff-only"]).current_dir(dir);
        let status = self.status(&mut cmd)?;
        if status.success() {
            Ok(())
        } else {
            Err(SyncError::Pull {
                path: dir.to_path_buf(),
                code: status.code(),
            })
        }
    }
}

/// What happened to the working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Freshly cloned.
    Cloned,
    /// Existing clone pulled.
    Updated,
    /// Existing clone used as-is.
    Reused,
}

/// A prepared working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingTree {
    /// Tree root.
    pub path: PathBuf,
    /// How it was prepared.
    pub action: SyncAction,
}

/// Ensure the working tree for `spec` exists and is at the wanted revision.
///
/// A directory without `.git` (an interrupted clone, or something the user
/// put there) is removed and cloned again.
///
/// # Errors
///
/// Returns [`SyncError`] if the clone or pull fails or the directory cannot be
/// prepared.
pub fn sync(
    spec: &PackageSpec,
    mode: SyncMode,
    vcs: &dyn Vcs,
    paths: &Paths,
) -> Result<WorkingTree, SyncError> {
    let dir = paths.working_tree(&spec.name);

    if dir.join(".git").exists() {
        let action = match mode {
            SyncMode::Update => {
                vcs.pull(&dir)?;
                SyncAction::Updated
            }
            SyncMode::Reuse => SyncAction::Reused,
        };
        return Ok(WorkingTree { path: dir, action });
    }

    if dir.exists() {
        tracing::warn!("{} is not a clone, removing", dir.display());
        remove_path(&dir)?;
    }

    let parent = paths.src_dir();
    fs::create_dir_all(&parent).map_err(|source| SyncError::Io {
        path: parent.clone(),
        source,
    })?;

    if let Err(e) = vcs.clone_shallow(&spec.url, &dir) {
        // Leave nothing half-cloned behind for the next attempt to trip on.
        if dir.exists() {
            let _ = remove_path(&dir);
        }
        return Err(e);
    }

    Ok(WorkingTree {
        path: dir,
        action: SyncAction::Cloned,
    })
}

fn remove_path(path: &Path) -> Result<(), SyncError> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|source| SyncError::Io {
        path: path.to_path_buf(),
        source,
    })
}
