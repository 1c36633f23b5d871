//! Terminal output.

pub mod console;
pub mod list;
pub mod theme;

pub use console::ConsoleReporter;
pub use theme::Theme;
