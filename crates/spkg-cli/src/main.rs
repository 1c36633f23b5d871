//! spkg - a minimal source-building package manager CLI

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use spkg_cli::cmd;
use spkg_cli::{Cli, Commands, sync_mode};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = cli.registry.as_deref();

    let result = match cli.command {
        Commands::Install {
            package,
            mode,
            update,
            verbose,
            timeout,
        } => cmd::install::install(
            &package,
            sync_mode(mode, update),
            verbose,
            timeout,
            registry,
        ),
        Commands::List => cmd::list::list(),
        Commands::Info { package } => cmd::info::info(&package, registry),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Install failures were already reported per package.
            if !e.is::<spkg_cli::ops::InstallError>() {
                eprintln!("error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
