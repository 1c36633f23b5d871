//! spkg - a minimal source-building package manager
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Clones a package's repository, works out how to build it, builds it and
//! puts the result on a managed `PATH`.
//!
//! # Architecture
//!
//! - **Registry**: an embedded TOML table of packages, overlaid by the user's
//!   own `registry.toml` and an optional `--registry` file.
//! - **Engine** (`spkg_core`): build-system detection, build driving and
//!   artifact location, each behind a trait so the orchestrator can be tested
//!   with fakes.
//! - **Orchestrator** (`ops::install`): the per-package state machine.
//! - **Ledger** (`store::ledger`): which packages have been installed.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.spkg/
//! ├── bin/            # Binaries and launchers
//! ├── src/<name>/     # Working trees
//! ├── logs/           # Build logs
//! ├── locks/          # Per-package locks
//! ├── config.toml
//! ├── registry.toml
//! └── installed.json
//! ```

pub mod cmd;
pub mod ops;
pub mod registry;
pub mod store;
pub mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use spkg_schema::SyncMode;

/// Version reported by `--version`, derived from git tags at build time.
pub const VERSION: &str = env!("SPKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "spkg")]
#[command(author, version = VERSION, about = "spkg - build and install packages from source")]
pub struct Cli {
    /// Extra registry file layered over the built-in and user registries
    #[arg(long, global = true, env = "SPKG_REGISTRY")]
    pub registry: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build and install a package from source
    Install {
        /// Package name
        package: String,
        /// What to do with an existing working tree
        #[arg(value_enum)]
        mode: Option<ModeArg>,
        /// Pull the latest source before building (same as `update`)
        #[arg(long, conflicts_with = "mode")]
        update: bool,
        /// Stream build output instead of writing it to the log
        #[arg(short, long)]
        verbose: bool,
        /// Kill any build step that runs longer than this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// List installed packages
    List,
    /// Show package info
    Info {
        /// Package name
        package: String,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Positional sync mode for `install`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Pull the existing clone before building
    Update,
    /// Build the existing clone as-is
    Reuse,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Update => Self::Update,
            ModeArg::Reuse => Self::Reuse,
        }
    }
}

/// Combine the positional mode and `--update` flag.
pub fn sync_mode(mode: Option<ModeArg>, update: bool) -> SyncMode {
    match mode {
        Some(mode) => mode.into(),
        None if update => SyncMode::Update,
        None => SyncMode::Reuse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_install_mode_parsing() {
        let cli = Cli::parse_from(["spkg", "install", "jq", "update"]);
        match cli.command {
            Commands::Install { package, mode, .. } => {
                assert_eq!(package, "jq");
                assert_eq!(sync_mode(mode, false), SyncMode::Update);
            }
            other => panic!("unexpected {other:?}"),
        }

        let cli = Cli::parse_from(["spkg", "install", "jq", "--update", "--timeout", "60"]);
        match cli.command {
            Commands::Install {
                mode,
                update,
                timeout,
                ..
            } => {
                assert_eq!(sync_mode(mode, update), SyncMode::Update);
                assert_eq!(timeout, Some(60));
            }
            other => panic!("unexpected {other:?}"),
        }

        let cli = Cli::parse_from(["spkg", "install", "jq"]);
        match cli.command {
            Commands::Install { mode, update, .. } => {
                assert_eq!(sync_mode(mode, update), SyncMode::Reuse);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["spkg", "install", "jq", "sideways"]).is_err());
    }
}
