//! Typed error taxonomy for the gateway's components.
//!
//! Each component boundary gets its own `thiserror` enum so the HTTP front end
//! can map failures onto the exact JSON-RPC behavior without string matching.

use thiserror::Error;

/// JSON-RPC error code: malformed request body.
pub const RPC_PARSE_ERROR: i64 = -32700;
/// JSON-RPC error code: unrecognized method.
pub const RPC_METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC error code: uncaught dispatch failure.
pub const RPC_INTERNAL_ERROR: i64 = -32603;

/// Failures a [`crate::supervisor::ChildSupervisor`] can surface to its caller.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("AlreadyRunning")]
    AlreadyRunning,

    #[error("SpawnFailed: {0}")]
    SpawnFailed(String),

    #[error("HandshakeTimeout")]
    HandshakeTimeout,

    #[error("ToolsListFailed: {0}")]
    ToolsListFailed(String),

    #[error("NotReady")]
    NotReady,

    #[error("RequestTimeout")]
    RequestTimeout,

    #[error("Server stopped")]
    ServerStopped,

    /// A JSON-RPC error returned by the child itself for a given request.
    #[error("{0}")]
    Remote(String),
}

/// Failures surfaced by the [`crate::manager::GatewayManager`].
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("AlreadyRunning")]
    AlreadyRunning,

    #[error("PortInUse: {0}")]
    PortInUse(u16),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures from the [`crate::registry::ToolRegistry`].
///
/// Reserved: per the namespacing design, collisions are dropped-and-logged
/// rather than rejected, so registration itself is currently infallible. Kept
/// as a typed enum so future invariants (e.g. an operator-facing strict mode)
/// have somewhere to live without changing call sites.
#[derive(Debug, Error)]
pub enum RegistryError {}
