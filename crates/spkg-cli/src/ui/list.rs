//! List output formatting

use crossterm::style::Stylize;

use super::theme::Theme;

/// Width of the package name column.
const NAME_WIDTH: usize = 20;

/// Print list header: a subtle section title, no column headers
pub fn print_list_header() {
    println!();
    println!("  {}", "Installed packages".dark_grey());
    println!();
}

/// Print a single package row: name, last install date, artifact
pub fn print_list_row(name: &str, date: &str, artifact: &str) {
    let theme = Theme::default();
    let name_part = format!("{name: <NAME_WIDTH$}");
    println!(
        "  {} {}  {}",
        name_part.with(theme.colors.package_name),
        date,
        artifact.with(theme.colors.secondary)
    );
}

/// Print list footer with the package count
pub fn print_list_footer(count: usize) {
    println!();
    let msg = format!(
        "{count} package{} installed",
        if count == 1 { "" } else { "s" }
    );
    println!("  {}", msg.dark_grey());
}
