pub mod builder;
pub mod config;
pub mod deps;
pub mod detect;
pub mod locate;
pub mod lock;
pub mod paths;
pub mod process;
pub mod reporter;
pub mod strategy;
pub mod sync;

pub use config::Config;
pub use paths::Paths;
pub use reporter::{NullReporter, Reporter};
pub use strategy::BuildStrategy;
