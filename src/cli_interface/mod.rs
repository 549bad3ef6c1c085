//! command line surface of the `blockfs` binary
mod cli_struct;
pub mod commands;

pub use cli_struct::*;
