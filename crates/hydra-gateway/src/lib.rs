//! hydra-gateway library crate.
//!
//! Provides the MCP gateway core — line framing, child supervision, the tool
//! registry, the gateway manager, and the HTTP JSON-RPC front end — plus the
//! ambient configuration and CLI types for the `hydra-gateway` binary.
//! Exposed as a library for integration testing and potential reuse by a
//! desktop shell.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod framing;
pub mod http;
pub mod manager;
pub mod registry;
pub mod supervisor;
