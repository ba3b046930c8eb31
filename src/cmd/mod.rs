//! CLI subcommands

pub mod index;
pub mod search;
