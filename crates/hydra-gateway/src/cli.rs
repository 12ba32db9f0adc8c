//! CLI argument types for hydra-gateway.
//!
//! Defines the top-level [`Cli`] struct and all subcommand [`Args`] using
//! clap's derive macros. Each subcommand maps to a module in [`commands`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Desktop MCP gateway aggregating stdio child servers behind a single HTTP JSON-RPC endpoint
#[derive(Parser, Debug)]
#[command(name = "hydra-gateway", version, about)]
pub struct Cli {
    /// Path to a gateway config TOML file (default: compiled defaults + env)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to a TOML file listing `[[child]]` launch specs
    #[arg(long, global = true)]
    pub children: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway: spawn enabled children and serve /mcp
    Serve(ServeArgs),
    /// Show resolved gateway configuration
    Config(ConfigArgs),
    /// Convenience note on how to check a running gateway's status
    Status(StatusArgs),
}

/// Arguments for the `serve` subcommand
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port override (overrides config file/env)
    #[arg(long)]
    pub port: Option<u16>,
}

/// Arguments for the `config` subcommand
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `status` subcommand
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Base URL of a running gateway (default: http://127.0.0.1:<configured port>)
    #[arg(long)]
    pub url: Option<String>,
}
