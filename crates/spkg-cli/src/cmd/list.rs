//! List command

use anyhow::{Context, Result};
use spkg_core::Paths;

use crate::store::Ledger;
use crate::ui::list::{print_list_footer, print_list_header, print_list_row};

/// List all installed packages
pub fn list() -> Result<()> {
    let paths = Paths::from_env().context("Could not determine home directory; set SPKG_HOME")?;
    let ledger = Ledger::load(&paths.ledger_path()).context("Failed to read the ledger")?;

    if ledger.is_empty() {
        println!();
        println!("  No packages installed.");
        println!("  Run 'spkg install <package>' to get started.");
        return Ok(());
    }

    print_list_header();
    for (name, entry) in ledger.iter() {
        let date = entry.last_installed.format("%Y-%m-%d").to_string();
        let artifact = entry
            .artifact
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        print_list_row(name.as_str(), &date, &artifact);
    }
    print_list_footer(ledger.len());

    Ok(())
}
