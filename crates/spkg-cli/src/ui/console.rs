//! Line-oriented terminal reporter.
//!
//! Builds run one package at a time and their output goes to a log file, so
//! plain sequential lines are enough: no cursor movement, nothing to redraw.
//! Progress goes to stdout; warnings and errors to stderr.

use crossterm::style::Stylize;
use spkg_core::Reporter;
use spkg_schema::PackageName;

use super::theme::Theme;

/// Prints progress with the default [`Theme`].
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    theme: Theme,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        println!();
        println!(
            "{} {}",
            title.bold(),
            "─".repeat(40).with(self.theme.colors.header)
        );
    }

    fn stage(&self, name: &PackageName, stage: &str) {
        println!(
            "  {} {} {}",
            self.theme.icons.active.with(self.theme.colors.active),
            name.as_str().with(self.theme.colors.package_name),
            stage.with(self.theme.colors.secondary)
        );
    }

    fn done(&self, name: &PackageName, detail: &str) {
        println!(
            "  {} {} {}",
            self.theme.icons.success.with(self.theme.colors.success),
            name.as_str().with(self.theme.colors.package_name),
            detail
        );
    }

    fn failed(&self, name: &PackageName, reason: &str) {
        let mut lines = reason.lines();
        eprintln!(
            "  {} {} {}",
            self.theme.icons.error.with(self.theme.colors.error),
            name.as_str().with(self.theme.colors.package_name),
            lines.next().unwrap_or_default().with(self.theme.colors.error)
        );
        // Remaining lines are the build log tail.
        for line in lines {
            eprintln!("    {}", line.with(self.theme.colors.secondary));
        }
    }

    fn info(&self, msg: &str) {
        println!("  {} {}", self.theme.icons.info, msg);
    }

    fn warning(&self, msg: &str) {
        eprintln!(
            "{} {}",
            self.theme.icons.warning.with(self.theme.colors.warning),
            msg.with(self.theme.colors.warning)
        );
    }

    fn error(&self, msg: &str) {
        eprintln!(
            "{} {}",
            self.theme.icons.error.with(self.theme.colors.error),
            msg.with(self.theme.colors.error)
        );
    }
}
