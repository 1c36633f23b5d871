pub mod context;
pub mod error;
pub mod install;

pub use context::InstallContext;
pub use error::InstallError;
