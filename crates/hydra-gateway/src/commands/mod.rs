//! Command implementations for hydra-gateway subcommands.
//!
//! Each module corresponds to a top-level subcommand exposed by the CLI.

pub mod config_cmd;
pub mod serve;
pub mod status;
