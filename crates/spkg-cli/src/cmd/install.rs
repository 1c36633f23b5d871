//! Install command

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use spkg_core::deps::{WhichProbe, system_package_manager};
use spkg_core::process::SystemRunner;
use spkg_core::sync::GitCli;
use spkg_core::{Config, Paths, Reporter};
use spkg_schema::{Registry, SyncMode};

use crate::ops::install::{InstallOptions, install_package, perform_ux_checks};
use crate::ops::{InstallContext, InstallError};
use crate::ui::ConsoleReporter;

/// Build and install one package
pub fn install(
    package: &str,
    mode: SyncMode,
    verbose: bool,
    timeout_secs: Option<u64>,
    registry_file: Option<&Path>,
) -> Result<()> {
    let paths = Paths::from_env().context("Could not determine home directory; set SPKG_HOME")?;
    let reporter = ConsoleReporter::new();

    let (config, registry) = load_setup(&paths, registry_file)
        .inspect_err(|e| reporter.error(&e.to_string()))?;

    let probe = WhichProbe;
    let packages = system_package_manager(config.package_manager, &probe);
    let vcs = GitCli::new(config.git());
    let runner = SystemRunner;

    let ctx = InstallContext {
        paths: &paths,
        config: &config,
        registry: &registry,
        vcs: &vcs,
        packages: &*packages,
        probe: &probe,
        runner: &runner,
        reporter: &reporter,
    };
    tracing::debug!("{ctx:?}");

    let opts = InstallOptions {
        mode,
        verbose,
        timeout: timeout_secs.map(Duration::from_secs),
    };

    let report = install_package(&ctx, package, &opts)?;

    perform_ux_checks(&paths.bin_dir(), &[report.artifact_name()], &reporter);
    Ok(())
}

fn load_setup(paths: &Paths, registry_file: Option<&Path>) -> Result<(Config, Registry), InstallError> {
    let config = Config::load(&paths.config_path())?;
    let registry = crate::registry::load(paths, registry_file)?;
    Ok((config, registry))
}
