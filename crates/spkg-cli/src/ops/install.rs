//! Package installation.
//!
//! [`install_package`] drives one package through the pipeline:
//!
//! ```text
//! lookup -> ensure deps -> lock -> sync -> detect | explicit -> build
//!        -> locate/publish -> ledger
//! ```
//!
//! Every stage either advances or ends the install with an [`InstallError`];
//! nothing is retried and nothing is rolled back. Missing prerequisites are the
//! one soft failure: they are reported and the build is attempted anyway.

use std::path::{Path, PathBuf};
use std::time::Duration;

use spkg_core::builder::{BuildContext, BuildDriver};
use spkg_core::deps::{self, EnsureReport};
use spkg_core::detect::detect;
use spkg_core::locate::{self, Artifact, ArtifactKind, LocateRequest};
use spkg_core::lock::PackageLock;
use spkg_core::sync::{self, SyncAction};
use spkg_core::{BuildStrategy, Reporter};
use spkg_schema::{BuildPlan, PackageName, PackageSpec, SyncMode};

use crate::ops::{InstallContext, InstallError};
use crate::store::Ledger;

/// Per-invocation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Reuse or update an existing working tree.
    pub mode: SyncMode,
    /// Stream build output instead of logging it.
    pub verbose: bool,
    /// Per-step timeout; falls back to the configured one.
    pub timeout: Option<Duration>,
}

/// What a successful install did.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub name: PackageName,
    /// Build system used (`cmake`, `gradle`, `explicit`, ...).
    pub strategy: &'static str,
    pub sync: SyncAction,
    pub deps: EnsureReport,
    pub artifact: Artifact,
    pub log_path: Option<PathBuf>,
}

impl InstallReport {
    /// Command name the package is invoked by.
    pub fn artifact_name(&self) -> &str {
        self.artifact
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Install `package` from source.
///
/// Failures are reported through the context's reporter before being
/// returned, so callers only need to turn them into an exit status.
pub fn install_package(
    ctx: &InstallContext<'_>,
    package: &str,
    opts: &InstallOptions,
) -> Result<InstallReport, InstallError> {
    let Some(spec) = ctx.registry.find(package) else {
        let err = InstallError::UnknownPackage(package.trim().to_string());
        ctx.reporter.error(&err.to_string());
        return Err(err);
    };

    ctx.reporter.section(&format!("Installing {}", spec.name));
    run_pipeline(ctx, spec, opts).inspect_err(|e| ctx.reporter.failed(&spec.name, &e.to_string()))
}

fn run_pipeline(
    ctx: &InstallContext<'_>,
    spec: &PackageSpec,
    opts: &InstallOptions,
) -> Result<InstallReport, InstallError> {
    let name = &spec.name;

    if !spec.requires.is_empty() {
        ctx.reporter.stage(name, "checking prerequisites");
    }
    let mut deps = deps::ensure(&spec.requires, ctx.probe, ctx.packages, ctx.reporter);

    let _lock = PackageLock::acquire(&ctx.paths.lock_path(name))?;

    ctx.reporter.stage(name, sync_stage(ctx, spec, opts.mode));
    let tree = sync::sync(spec, opts.mode, ctx.vcs, ctx.paths)?;
    if tree.action == SyncAction::Reused {
        ctx.reporter.info(&format!(
            "Reusing existing source in {} (run `spkg install {name} update` to pull)",
            tree.path.display()
        ));
    }

    let strategy = match &spec.build {
        BuildPlan::Auto => detect(&tree.path),
        BuildPlan::Explicit(steps) => BuildStrategy::Explicit(steps.clone()),
    };
    tracing::info!("{name}: using {strategy} strategy");

    let extra = strategy.extra_requirements(ctx.config);
    if !extra.is_empty() {
        let more = deps::ensure(&extra, ctx.probe, ctx.packages, ctx.reporter);
        deps.missing.extend(more.missing);
        deps.installed.extend(more.installed);
        deps.failed.extend(more.failed);
    }

    ctx.reporter.stage(name, &format!("building with {strategy}"));
    let cx = BuildContext {
        tree: tree.path.clone(),
        prefix: ctx.paths.home().to_path_buf(),
        bin_dir: ctx.paths.bin_dir(),
        jobs: ctx.config.jobs(),
        name: spec.bin.clone(),
        log_path: ctx.paths.build_log_path(name),
    };
    let outcome = BuildDriver::new(ctx.runner)
        .with_timeout(opts.timeout.or_else(|| ctx.config.build_timeout()))
        .verbose(opts.verbose)
        .run(&strategy, &cx)?;

    if !outcome.success {
        let mut msg = outcome.diagnostic;
        if let Some(log) = &outcome.log_path {
            msg.push_str(&format!("\nFull log: {}", log.display()));
        }
        return Err(InstallError::Build(msg));
    }

    ctx.reporter.stage(name, "locating artifact");
    let artifact = match outcome.artifact {
        Some(path) => Artifact {
            path,
            kind: ArtifactKind::Native,
        },
        None => {
            let bin_dir = ctx.paths.bin_dir();
            let req = LocateRequest {
                tree: &tree.path,
                bin_dir: &bin_dir,
                expected: &spec.bin,
                runtime: ctx.config.java_runtime(),
            };
            locate::resolve(&strategy.artifact_search(&spec.bin), &req)?.ok_or_else(|| {
                InstallError::ArtifactNotFound {
                    expected: spec.bin.clone(),
                }
            })?
        }
    };

    Ledger::record(
        &ctx.paths.ledger_path(),
        &ctx.paths.ledger_lock_path(),
        name,
        Some(&artifact.path),
    )?;

    let detail = match &artifact.kind {
        ArtifactKind::Native => format!("installed {}", artifact.path.display()),
        ArtifactKind::Archive { archive } => format!(
            "installed {} (launcher for {})",
            artifact.path.display(),
            archive.display()
        ),
    };
    ctx.reporter.done(name, &detail);

    Ok(InstallReport {
        name: name.clone(),
        strategy: strategy.name(),
        sync: tree.action,
        deps,
        artifact,
        log_path: outcome.log_path,
    })
}

fn sync_stage(ctx: &InstallContext<'_>, spec: &PackageSpec, mode: SyncMode) -> &'static str {
    let exists = ctx.paths.working_tree(&spec.name).join(".git").exists();
    match (exists, mode) {
        (false, _) => "cloning",
        (true, SyncMode::Update) => "updating source",
        (true, SyncMode::Reuse) => "preparing source",
    }
}

/// Warn when the managed bin directory is not on `PATH`, or when another
/// binary of the same name would shadow the one just installed.
pub fn perform_ux_checks(bin_dir: &Path, bins: &[&str], reporter: &dyn Reporter) {
    let path_env = std::env::var_os("PATH").unwrap_or_default();
    let is_in_path = std::env::split_paths(&path_env).any(|p| p == bin_dir);

    if !is_in_path {
        reporter.warning(&format!("{} is not in your PATH.", bin_dir.display()));
        reporter.info(&format!(
            "Add this to your shell profile: export PATH=\"{}:$PATH\"",
            bin_dir.display()
        ));
        return;
    }

    for bin in bins {
        if let Ok(path) = which::which(bin)
            && !path.starts_with(bin_dir)
        {
            reporter.warning(&format!(
                "'{}' is shadowed by {} earlier in PATH",
                bin,
                path.display()
            ));
        }
    }
}
