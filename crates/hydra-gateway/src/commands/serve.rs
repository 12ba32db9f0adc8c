//! `serve` subcommand — builds a [`GatewayManager`] from resolved
//! configuration, starts it, and runs until ctrl-c.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::ServeArgs;
use crate::config::{ConfigSource, GatewayConfig, StaticConfigSource};
use crate::manager::GatewayManager;

/// Run the `serve` subcommand.
///
/// Spawns every enabled child, registers their tools, and binds the HTTP
/// front end. The gateway runs in the foreground of this process — there is
/// no daemon mode; the desktop shell that hosts `hydra-gateway` is
/// responsible for supervising this process itself.
pub async fn run(
    config_path: &Option<PathBuf>,
    children_path: &Option<PathBuf>,
    args: ServeArgs,
) -> anyhow::Result<()> {
    let mut config = GatewayConfig::load(config_path.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let config_source: Arc<dyn ConfigSource> = match children_path {
        Some(path) => Arc::new(StaticConfigSource::from_file(path)?),
        None => Arc::new(StaticConfigSource::new(Vec::new())),
    };

    let manager = Arc::new(GatewayManager::new(config, config_source));
    let status = manager.start().await?;
    tracing::info!(
        port = status.port,
        servers = status.servers.len(),
        total_tools = status.total_tools,
        "hydra-gateway serving"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested, stopping gateway");
    manager.stop().await;
    Ok(())
}
