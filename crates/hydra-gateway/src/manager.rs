//! Gateway Manager (C4): orchestrates supervisor startup/shutdown, registry
//! population, and the HTTP front end's lifecycle.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::{ChildSpec, ConfigSource, GatewayConfig};
use crate::error::GatewayError;
use crate::http;
use crate::registry::ToolRegistry;
use crate::supervisor::ChildSupervisor;

/// One entry in a [`GatewayStatus`] snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServerStatus {
    pub id: String,
    pub name: String,
    pub status: String,
    pub tool_count: usize,
    pub error: Option<String>,
}

/// Produced on demand by [`GatewayManager::status`]; never cached.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GatewayStatus {
    pub running: bool,
    pub port: u16,
    pub servers: Vec<ServerStatus>,
    pub total_tools: usize,
}

struct Handle {
    supervisors: Vec<Arc<ChildSupervisor>>,
    shutdown: tokio::sync::oneshot::Sender<()>,
    server_task: tokio::task::JoinHandle<()>,
}

/// Owns the running set of supervisors, the shared registry, and the HTTP
/// server task. One manager per gateway process.
pub struct GatewayManager {
    config_source: Arc<dyn ConfigSource>,
    registry: Arc<ToolRegistry>,
    config: RwLock<GatewayConfig>,
    running: AtomicBool,
    port: AtomicU16,
    handle: RwLock<Option<Handle>>,
    /// Diagnostic only — never sent on the wire. Lets an operator correlate
    /// log lines across a single process lifetime of this manager.
    session_id: String,
}

impl GatewayManager {
    pub fn new(config: GatewayConfig, config_source: Arc<dyn ConfigSource>) -> Self {
        let port = config.port;
        Self {
            config_source,
            registry: Arc::new(ToolRegistry::new()),
            config: RwLock::new(config),
            running: AtomicBool::new(false),
            port: AtomicU16::new(port),
            handle: RwLock::new(None),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Diagnostic identifier for this manager's process lifetime. Not part of
    /// any wire protocol.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    /// Changing the port while supervisors are running would leave the HTTP
    /// listener bound to a stale address, so this is rejected unless stopped.
    pub async fn set_port(&self, port: u16) -> Result<(), GatewayError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(GatewayError::AlreadyRunning);
        }
        self.port.store(port, Ordering::SeqCst);
        self.config.write().await.port = port;
        Ok(())
    }

    pub async fn start(self: &Arc<Self>) -> Result<GatewayStatus, GatewayError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(GatewayError::AlreadyRunning);
        }

        self.registry.clear();

        let specs: Vec<ChildSpec> = self
            .config_source
            .enabled_specs()
            .map_err(|e| GatewayError::Io(std::io::Error::other(e.to_string())))?;

        let (startup_timeout, request_timeout) = {
            let config = self.config.read().await;
            (config.startup_timeout(), config.request_timeout())
        };

        // "All settled" join: every supervisor starts concurrently (each on
        // its own task) and each failure is isolated — one dead child must
        // never abort its peers or the join itself.
        let join_handles: Vec<_> = specs
            .into_iter()
            .map(|spec| {
                let supervisor = Arc::new(ChildSupervisor::new(spec, startup_timeout, request_timeout));
                let task_supervisor = Arc::clone(&supervisor);
                let join = tokio::spawn(async move {
                    let result = task_supervisor.start().await;
                    (task_supervisor, result)
                });
                (supervisor, join)
            })
            .collect();

        let mut supervisors = Vec::with_capacity(join_handles.len());
        for (fallback_supervisor, join) in join_handles {
            let (supervisor, result) = match join.await {
                Ok(outcome) => outcome,
                Err(_) => (fallback_supervisor, Err(crate::error::SupervisorError::SpawnFailed(
                    "start task panicked".to_string(),
                ))),
            };
            match result {
                Ok(()) => {
                    let snapshot = supervisor.state().await;
                    self.registry.register(Arc::clone(&supervisor), &snapshot.tools);
                }
                Err(err) => {
                    tracing::warn!(child = %supervisor.name(), error = %err, "child failed to start");
                }
            }
            supervisors.push(supervisor);
        }

        let port = self.port.load(Ordering::SeqCst);
        let app = http::build_router(Arc::clone(&self.registry));
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let listener = match tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => listener,
            Err(err) => {
                // Tear down everything we just spun up; start() is all-or-nothing
                // from the caller's point of view even though supervisor starts
                // were all-settled among themselves.
                for supervisor in &supervisors {
                    supervisor.stop().await;
                }
                self.registry.clear();
                return Err(if err.kind() == std::io::ErrorKind::AddrInUse {
                    GatewayError::PortInUse(port)
                } else {
                    GatewayError::Io(err)
                });
            }
        };

        // Port 0 asks the OS for an ephemeral port; reflect what it actually
        // bound so `status().port` is never stale.
        let bound_port = listener.local_addr().map(|a| a.port()).unwrap_or(port);
        self.port.store(bound_port, Ordering::SeqCst);

        let server_task = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        *self.handle.write().await = Some(Handle {
            supervisors,
            shutdown: shutdown_tx,
            server_task,
        });
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(port = bound_port, session_id = %self.session_id, "gateway started");

        Ok(self.status().await)
    }

    /// Idempotent: stops the HTTP server first, then all supervisors
    /// concurrently, then clears the registry.
    pub async fn stop(&self) {
        let handle = self.handle.write().await.take();
        let Some(handle) = handle else {
            self.running.store(false, Ordering::SeqCst);
            return;
        };

        let _ = handle.shutdown.send(());
        let _ = handle.server_task.await;

        let stop_handles: Vec<_> = handle
            .supervisors
            .iter()
            .cloned()
            .map(|s| tokio::spawn(async move { s.stop().await }))
            .collect();
        for handle in stop_handles {
            let _ = handle.await;
        }

        self.registry.clear();
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("gateway stopped");
    }

    pub async fn refresh(self: &Arc<Self>) -> Result<GatewayStatus, GatewayError> {
        self.stop().await;
        self.start().await
    }

    /// O(N) in supervisor count; never touches I/O.
    pub async fn status(&self) -> GatewayStatus {
        let handle = self.handle.read().await;
        let servers = match handle.as_ref() {
            Some(h) => {
                let mut servers = Vec::with_capacity(h.supervisors.len());
                for supervisor in &h.supervisors {
                    let snapshot = supervisor.state().await;
                    servers.push(ServerStatus {
                        id: snapshot.id,
                        name: snapshot.name,
                        status: snapshot.status.as_str().to_string(),
                        tool_count: snapshot.tools.len(),
                        error: snapshot.error,
                    });
                }
                servers
            }
            None => Vec::new(),
        };

        GatewayStatus {
            running: self.running.load(Ordering::SeqCst),
            port: self.port.load(Ordering::SeqCst),
            total_tools: self.registry.total_tools(),
            servers,
        }
    }
}
