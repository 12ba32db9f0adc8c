//! `status` subcommand — convenience stub.
//!
//! There is no background daemon and no IPC channel to a running gateway
//! process: `hydra-gateway serve` runs in the foreground of whatever process
//! launched it. Checking status therefore means calling the gateway's own
//! HTTP endpoint (`tools/list` or `ping`), which this command documents
//! rather than performs on the caller's behalf.

use crate::cli::StatusArgs;
use crate::config::GatewayConfig;

pub async fn run(args: StatusArgs) -> anyhow::Result<()> {
    let url = args.url.unwrap_or_else(|| {
        let port = GatewayConfig::default().port;
        format!("http://127.0.0.1:{port}/mcp")
    });

    println!("hydra-gateway has no background daemon to query directly.");
    println!("A running gateway exposes its own status over its HTTP endpoint:");
    println!();
    println!(
        "  curl -s -X POST {url} -H 'content-type: application/json' \\",
    );
    println!("       -d '{{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}}'");
    println!();
    println!("Per-child lifecycle state is not yet surfaced by a dedicated method on the");
    println!("wire protocol; it is available to in-process callers via `GatewayManager::status`.");
    Ok(())
}
