//! Subcommand implementations of `wintree`.

pub mod build;
pub mod dist;
pub mod merge;
pub mod pairwise;
pub mod partition;
pub mod reroot;
pub mod run;
pub mod utils;
