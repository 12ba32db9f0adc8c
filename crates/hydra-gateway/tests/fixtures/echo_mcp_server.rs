//! Minimal line-delimited JSON-RPC MCP server used as a real child process in
//! integration tests.
//!
//! Reads newline-delimited JSON-RPC requests from stdin, writes
//! newline-delimited responses to stdout.
//!
//! # Supported methods
//!
//! - `initialize` — returns a protocol-compatible capabilities/server-info
//!   payload. Accepts an optional `--delay-init-ms <n>` argument that sleeps
//!   before replying, for exercising handshake-timeout behavior.
//! - `notifications/initialized` — accepted, no response.
//! - `tools/list` — returns two tools: `echo` and `reverse`.
//! - `tools/call` —
//!   - `echo`: replies with the `text` argument (or the whole arguments
//!     object if no `text` field) unchanged in `content[0].text`.
//!   - `reverse`: replies with the `text` argument reversed.
//!   - `crash` (not listed in `tools/list`, reachable only by a direct
//!     `tools/call`): exits the process with code 1, for exercising
//!     mid-session crash handling.
//!   - any call whose arguments include `"sleep_ms": <n>` sleeps `n`
//!     milliseconds before responding, for exercising request-timeout
//!     behavior.

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};

fn main() {
    let delay_init_ms = parse_delay_init_arg();

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let msg: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        handle_message(&msg, delay_init_ms, &mut writer);
    }
}

fn parse_delay_init_arg() -> u64 {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--delay-init-ms" {
            if let Some(value) = args.next() {
                return value.parse().unwrap_or(0);
            }
        }
    }
    0
}

fn handle_message(msg: &Value, delay_init_ms: u64, writer: &mut impl Write) {
    let method = msg.get("method").and_then(|v| v.as_str());
    let id = msg.get("id").cloned();

    match method {
        Some("initialize") => {
            if delay_init_ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(delay_init_ms));
            }
            let resp = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": { "listChanged": true } },
                    "serverInfo": { "name": "echo-mcp-server", "version": "0.1.0" }
                }
            });
            write_msg(writer, &resp);
        }

        Some("tools/list") => {
            let resp = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "tools": [
                        {
                            "name": "echo",
                            "description": "Echo back the provided text",
                            "inputSchema": {
                                "type": "object",
                                "properties": { "text": { "type": "string" } }
                            }
                        },
                        {
                            "name": "reverse",
                            "description": "Reverse the provided text",
                            "inputSchema": {
                                "type": "object",
                                "properties": { "text": { "type": "string" } }
                            }
                        }
                    ]
                }
            });
            write_msg(writer, &resp);
        }

        Some("tools/call") => {
            let tool_name = msg
                .pointer("/params/name")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let arguments = msg
                .pointer("/params/arguments")
                .cloned()
                .unwrap_or(json!({}));

            if tool_name == "crash" {
                std::process::exit(1);
            }

            if let Some(sleep_ms) = arguments.get("sleep_ms").and_then(|v| v.as_u64()) {
                std::thread::sleep(std::time::Duration::from_millis(sleep_ms));
            }

            let text = arguments.get("text").cloned().unwrap_or_else(|| arguments.clone());
            let result_text = match (tool_name, text.as_str()) {
                ("reverse", Some(s)) => s.chars().rev().collect::<String>(),
                (_, Some(s)) => s.to_string(),
                (_, None) => text.to_string(),
            };

            let resp = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "content": [{ "type": "text", "text": result_text }]
                }
            });
            write_msg(writer, &resp);
        }

        Some("notifications/initialized") | Some("notifications/cancelled") => {
            // Notifications have no response.
        }

        Some(unknown) => {
            if let Some(req_id) = id {
                let resp = json!({
                    "jsonrpc": "2.0",
                    "id": req_id,
                    "error": { "code": -32601, "message": format!("Method not found: {unknown}") }
                });
                write_msg(writer, &resp);
            }
        }

        None => {}
    }
}

fn write_msg(writer: &mut impl Write, msg: &Value) {
    let s = serde_json::to_string(msg).expect("serialize JSON");
    writeln!(writer, "{s}").expect("write to stdout");
    writer.flush().expect("flush stdout");
}
