//! Shared types for spkg.
//!
//! Everything here is plain data: package names, the immutable
//! [`PackageSpec`] records loaded from the registry, and the structured
//! build steps a registry entry may carry. The engine (`spkg-core`) and the
//! CLI (`spkg-cli`) both depend on this crate; neither of them parses TOML
//! registry files on its own.

pub mod registry;
pub mod spec;
pub mod types;

// Re-exports
pub use registry::{Registry, RegistryError};
pub use spec::{BuildPlan, BuildStep, Invocation, PackageSpec, Requirement};
pub use types::*;
