//! Command modules - one file per CLI command

pub mod completions;
pub mod info;
pub mod install;
pub mod list;
