//! Info command

use std::path::Path;

use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;
use spkg_core::Paths;
use spkg_core::detect::detect;
use spkg_schema::BuildPlan;

use crate::store::Ledger;

/// Show registry entry and local state for a package
pub fn info(package: &str, registry_file: Option<&Path>) -> Result<()> {
    let paths = Paths::from_env().context("Could not determine home directory; set SPKG_HOME")?;
    let registry = crate::registry::load(&paths, registry_file).context("Failed to load registry")?;

    let Some(spec) = registry.find(package) else {
        bail!("Package '{}' not found", package.trim());
    };

    let ledger = Ledger::load(&paths.ledger_path()).context("Failed to read the ledger")?;
    let tree = paths.working_tree(&spec.name);
    let lw = 12;

    println!();
    println!("  {}", spec.name.as_str().white().bold());
    if !spec.description.is_empty() {
        println!("  {}", spec.description);
    }
    println!();

    if !spec.homepage.is_empty() {
        println!("  {:<lw$}{}", "homepage", spec.homepage);
    }
    println!("  {:<lw$}{}", "source", spec.url);
    println!("  {:<lw$}{}", "binary", spec.bin);

    match &spec.build {
        BuildPlan::Auto if tree.is_dir() => {
            println!("  {:<lw$}auto (detected: {})", "build", detect(&tree));
        }
        BuildPlan::Auto => println!("  {:<lw$}auto", "build"),
        BuildPlan::Explicit(steps) => {
            println!("  {:<lw$}", "build");
            for step in steps {
                println!("  {:<lw$}  {}", "", step.to_string().dark_grey());
            }
        }
    }

    if !spec.requires.is_empty() {
        let reqs: Vec<String> = spec
            .requires
            .iter()
            .map(|r| {
                if r.tool == r.package {
                    r.tool.clone()
                } else {
                    format!("{} ({})", r.tool, r.package)
                }
            })
            .collect();
        println!("  {:<lw$}{}", "requires", reqs.join(", "));
    }

    if tree.is_dir() {
        println!("  {:<lw$}{}", "tree", tree.display());
    }

    match ledger.get(&spec.name) {
        Some(entry) => {
            let first = entry.first_installed.format("%Y-%m-%d");
            let last = entry.last_installed.format("%Y-%m-%d %H:%M");
            println!("  {:<lw$}{last} (first {first})", "installed");
            if let Some(artifact) = &entry.artifact {
                println!("  {:<lw$}{}", "artifact", artifact.display());
            }
        }
        None => println!("  {:<lw$}{}", "installed", "no".dark_grey()),
    }

    Ok(())
}
