//! `config` subcommand — show resolved gateway configuration.
//!
//! Loads the resolved [`GatewayConfig`] and prints it either as JSON
//! (`--json`) or as a human-readable key=value table.

use std::path::PathBuf;

use crate::cli::ConfigArgs;
use crate::config::GatewayConfig;

/// Run the `config` subcommand.
///
/// # Errors
///
/// Returns an error if the config file exists but fails to parse.
pub async fn run(config_path: &Option<PathBuf>, args: ConfigArgs) -> anyhow::Result<()> {
    let config = GatewayConfig::load(config_path.as_deref())?;

    if args.json {
        let json = serde_json::to_string_pretty(&config)?;
        println!("{json}");
    } else {
        println!("hydra-gateway configuration:");
        println!("  port                   = {}", config.port);
        println!("  startup_timeout_secs   = {}", config.startup_timeout_secs);
        println!("  request_timeout_secs   = {}", config.request_timeout_secs);
        println!("  log_level              = {}", config.log_level);
    }

    Ok(())
}
