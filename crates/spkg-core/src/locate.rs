//! Artifact location.
//!
//! After a build succeeds the deliverable can be in several places depending
//! on the ecosystem: installed straight into `<home>/bin`, left in the tree
//! root by a bare `make`, or packaged as an archive under Gradle's
//! `build/libs`. The locator searches in priority order and never fails hard:
//! not finding anything is an ordinary outcome the orchestrator reports.
//!
//! Whatever is found ends up in `<home>/bin` under the expected name. Native
//! binaries are copied there ([`publish`]); archives get a generated launcher
//! ([`write_launcher`]) so callers never need to know which kind a package is.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::strategy::{ArtifactSearch, SearchBase, SearchRoot};

/// Extensions of interpreted sources that are never the compiled deliverable.
const SCRIPT_EXTENSIONS: &[&str] = &[
    "sh", "bash", "zsh", "fish", "py", "pl", "rb", "lua", "js", "php", "tcl", "awk", "ps1",
    "bat", "cmd",
];

/// Packaged archive formats runnable with `<runtime> -jar`.
const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "war"];

/// Archive name suffixes that are not the runnable artifact.
const EXCLUDED_ARCHIVE_SUFFIXES: &[&str] = &["-sources", "-javadoc", "-plain", "-test", "-tests"];

/// How deep the generic search descends below its root.
const SEARCH_DEPTH: usize = 2;

/// Errors that can occur while publishing a located artifact.
#[derive(Error, Debug)]
pub enum LocateError {
    /// Copying the artifact or writing the launcher failed.
    #[error("Failed to install {}: {source}", .path.display())]
    Io {
        /// Destination being written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A glob pattern built from the working tree path was rejected.
    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl LocateError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where a located artifact came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A native executable.
    Native,
    /// A packaged archive run through a generated launcher.
    Archive {
        /// Archive copied into the binary directory.
        archive: PathBuf,
    },
}

/// The final, reachable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path inside the managed binary directory.
    pub path: PathBuf,
    /// Native binary or launcher.
    pub kind: ArtifactKind,
}

/// Inputs for [`resolve`].
#[derive(Debug, Clone, Copy)]
pub struct LocateRequest<'a> {
    /// Package working tree.
    pub tree: &'a Path,
    /// Managed binary directory.
    pub bin_dir: &'a Path,
    /// Expected artifact file name.
    pub expected: &'a str,
    /// Runtime command for archive launchers.
    pub runtime: &'a str,
}

/// Find the most plausible build output under `root`.
///
/// 1. A file named exactly `expected` directly under `root`.
/// 2. Any executable file within two levels that does not carry a script
///    extension. Shallower candidates win, then path order.
pub fn locate(root: &Path, expected: &str) -> Option<PathBuf> {
    locate_exact(root, expected).or_else(|| find_executable(root))
}

/// Only step 1 of [`locate`].
pub fn locate_exact(root: &Path, expected: &str) -> Option<PathBuf> {
    let exact = root.join(expected);
    exact.is_file().then_some(exact)
}

fn find_executable(root: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<(usize, PathBuf)> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(SEARCH_DEPTH)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| !has_script_extension(e.path()) && is_executable(e.path()))
        .map(|e| (e.depth(), e.into_path()))
        .collect();

    candidates.sort();
    candidates.into_iter().next().map(|(_, path)| path)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn has_script_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SCRIPT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "exe")
}

/// Search according to a strategy's plan and make the result reachable in
/// the binary directory.
///
/// Returns `Ok(None)` when nothing plausible was built.
///
/// # Errors
///
/// Returns [`LocateError`] if a candidate was found but could not be copied
/// into the binary directory.
pub fn resolve(
    search: &ArtifactSearch,
    req: &LocateRequest<'_>,
) -> Result<Option<Artifact>, LocateError> {
    match search {
        ArtifactSearch::Roots(roots) => resolve_roots(roots, req),
        ArtifactSearch::Gradle(fallback) => {
            if let Some(archive) = find_archive(req.tree, req.expected)? {
                tracing::debug!("Found archive {}", archive.display());
                return install_archive(&archive, req).map(Some);
            }
            tracing::debug!("No archive under build/libs, scanning native output");
            resolve_roots(fallback, req)
        }
    }
}

fn resolve_roots(
    roots: &[SearchRoot],
    req: &LocateRequest<'_>,
) -> Result<Option<Artifact>, LocateError> {
    for root in roots {
        let dir = match &root.base {
            SearchBase::Bin => req.bin_dir.to_path_buf(),
            SearchBase::Tree(None) => req.tree.to_path_buf(),
            SearchBase::Tree(Some(sub)) => req.tree.join(sub),
        };
        if !dir.is_dir() {
            continue;
        }

        let found = if root.exact_only {
            locate_exact(&dir, req.expected)
        } else {
            locate(&dir, req.expected)
        };

        if let Some(path) = found {
            tracing::debug!("Located {}", path.display());
            let path = publish(&path, req.bin_dir, req.expected)?;
            return Ok(Some(Artifact {
                path,
                kind: ArtifactKind::Native,
            }));
        }
    }
    Ok(None)
}

/// Copy `artifact` to `<bin_dir>/<name>` with mode 0755.
///
/// An artifact already at that location is returned unchanged.
///
/// # Errors
///
/// Returns [`LocateError::Io`] if the directory cannot be created or the copy
/// fails.
pub fn publish(artifact: &Path, bin_dir: &Path, name: &str) -> Result<PathBuf, LocateError> {
    let dest = bin_dir.join(name);
    if artifact == dest {
        return Ok(dest);
    }

    fs::create_dir_all(bin_dir).map_err(|e| LocateError::io(bin_dir, e))?;
    // Unlink first: overwriting a binary that is currently running fails
    // with ETXTBSY on Linux, replacing the directory entry does not.
    if dest.exists() {
        fs::remove_file(&dest).map_err(|e| LocateError::io(&dest, e))?;
    }
    fs::copy(artifact, &dest).map_err(|e| LocateError::io(&dest, e))?;
    set_executable(&dest)?;
    Ok(dest)
}

/// Find a packaged `.jar`/`.war` under `build/libs` (or `*/build/libs` for
/// multi-project builds), skipping sources/javadoc/plain/test archives.
/// Archives whose name starts with `expected` are preferred.
///
/// # Errors
///
/// Returns [`LocateError::Pattern`] if the tree path cannot form a glob.
pub fn find_archive(tree: &Path, expected: &str) -> Result<Option<PathBuf>, LocateError> {
    let base = glob::Pattern::escape(&tree.to_string_lossy());
    let mut archives = Vec::new();

    for libs in [format!("{base}/build/libs"), format!("{base}/*/build/libs")] {
        for ext in ARCHIVE_EXTENSIONS {
            archives.extend(
                glob::glob(&format!("{libs}/*.{ext}"))?
                    .filter_map(Result::ok)
                    .filter(|p| p.is_file() && !is_auxiliary_archive(p)),
            );
        }
        // Root project output beats subprojects.
        if !archives.is_empty() {
            break;
        }
    }

    archives.sort();
    let preferred = archives.iter().position(|p| {
        p.file_stem()
            .is_some_and(|s| s.to_string_lossy().starts_with(expected))
    });
    Ok(match preferred {
        Some(idx) => Some(archives.swap_remove(idx)),
        None => archives.into_iter().next(),
    })
}

fn is_auxiliary_archive(path: &Path) -> bool {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|stem| EXCLUDED_ARCHIVE_SUFFIXES.iter().any(|suf| stem.ends_with(suf)))
}

fn install_archive(archive: &Path, req: &LocateRequest<'_>) -> Result<Artifact, LocateError> {
    fs::create_dir_all(req.bin_dir).map_err(|e| LocateError::io(req.bin_dir, e))?;

    let ext = archive
        .extension()
        .map_or_else(|| "jar".into(), |e| e.to_string_lossy());
    let dest_archive = req.bin_dir.join(format!("{}.{ext}", req.expected));
    fs::copy(archive, &dest_archive).map_err(|e| LocateError::io(&dest_archive, e))?;

    let launcher = req.bin_dir.join(req.expected);
    write_launcher(&launcher, req.runtime, &dest_archive)?;

    Ok(Artifact {
        path: launcher,
        kind: ArtifactKind::Archive {
            archive: dest_archive,
        },
    })
}

/// Write a POSIX shell launcher at `launcher` that runs
/// `<runtime> -jar <archive>` and forwards all arguments unchanged.
///
/// # Errors
///
/// Returns [`LocateError::Io`] if the script cannot be written.
pub fn write_launcher(launcher: &Path, runtime: &str, archive: &Path) -> Result<(), LocateError> {
    let script = format!(
        "#!/bin/sh\n# Generated by spkg\nexec {} -jar {} \"$@\"\n",
        sh_quote(runtime),
        sh_quote(&archive.to_string_lossy()),
    );
    if launcher.exists() {
        fs::remove_file(launcher).map_err(|e| LocateError::io(launcher, e))?;
    }
    fs::write(launcher, script).map_err(|e| LocateError::io(launcher, e))?;
    set_executable(launcher)
}

/// Single-quote a string for POSIX sh.
fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), LocateError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| LocateError::io(path, e))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), LocateError> {
    Ok(())
}
