//! Domain-specific errors for package operations

use spkg_core::config::ConfigError;
use spkg_core::locate::LocateError;
use spkg_core::lock::LockError;
use spkg_core::sync::SyncError;
use spkg_schema::RegistryError;
use thiserror::Error;

use crate::store::LedgerError;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Unknown package '{0}'")]
    UnknownPackage(String),

    #[error("Source sync failed: {0}")]
    Sync(#[from] SyncError),

    /// A step failed or no build system was recognised. Carries the failing
    /// step and the tail of the build log.
    #[error("Build failed: {0}")]
    Build(String),

    #[error("Build succeeded but no '{expected}' artifact was found")]
    ArtifactNotFound { expected: String },

    #[error("Failed to install artifact: {0}")]
    Publish(#[from] LocateError),

    #[error(transparent)]
    Locked(#[from] LockError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
