//! hydra-gateway — aggregates stdio MCP child servers behind a single HTTP
//! JSON-RPC endpoint.
//!
//! # Subcommands
//!
//! - `serve`  — Start the gateway: spawn enabled children, serve `/mcp`
//! - `config` — Show resolved gateway configuration
//! - `status` — Convenience note on how to query a running gateway

use clap::Parser;
use hydra_core::logging;

use hydra_gateway::cli::{Cli, Commands};
use hydra_gateway::commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => commands::serve::run(&cli.config, &cli.children, args).await,
        Commands::Config(args) => commands::config_cmd::run(&cli.config, args).await,
        Commands::Status(args) => commands::status::run(args).await,
    }
}
