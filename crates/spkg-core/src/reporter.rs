//! Reporter trait for dependency injection
//!
//! This trait allows core logic to report progress and status without
//! being coupled to a specific terminal implementation.

use spkg_schema::PackageName;

pub trait Reporter: Send + Sync {
    /// Indicates a new section or phase has started (e.g. "Installing jq").
    fn section(&self, title: &str);

    /// A package entered a new pipeline stage (e.g. "cloning", "building").
    fn stage(&self, name: &PackageName, stage: &str);

    /// Marks a package operation as successfully completed.
    fn done(&self, name: &PackageName, detail: &str);

    /// Marks a package operation as failed with a specific reason.
    fn failed(&self, name: &PackageName, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn stage(&self, _: &PackageName, _: &str) {}
    fn done(&self, _: &PackageName, _: &str) {}
    fn failed(&self, _: &PackageName, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}
