//! Shared installation context.
//!
//! Groups the collaborators the orchestrator needs so each can be swapped for a
//! fake in tests.

use std::fmt;

use spkg_core::deps::{PackageManager, ToolProbe};
use spkg_core::process::CommandRunner;
use spkg_core::sync::Vcs;
use spkg_core::{Config, Paths, Reporter};
use spkg_schema::Registry;

/// Everything [`crate::ops::install::install_package`] talks to.
#[derive(Clone, Copy)]
pub struct InstallContext<'a> {
    pub paths: &'a Paths,
    pub config: &'a Config,
    pub registry: &'a Registry,
    pub vcs: &'a dyn Vcs,
    pub packages: &'a dyn PackageManager,
    pub probe: &'a dyn ToolProbe,
    pub runner: &'a dyn CommandRunner,
    pub reporter: &'a dyn Reporter,
}

impl fmt::Debug for InstallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallContext")
            .field("paths", &self.paths)
            .field("config", &self.config)
            .field("package_manager", &self.packages.name())
            .finish_non_exhaustive()
    }
}
