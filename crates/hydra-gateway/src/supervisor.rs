//! Child Supervisor (C2): owns exactly one child MCP server's process
//! lifecycle, handshake, and request/response correlation.
//!
//! Grounded on the spawn-and-pump shape of a single-child stdio proxy, lifted
//! to an explicit state machine so a `GatewayManager` can own many of these
//! side by side and report on each independently.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::time::timeout;

use crate::config::ChildSpec;
use crate::error::SupervisorError;
use crate::framing::{write_line, LineFramer};

const STARTUP_PROBE: Duration = Duration::from_millis(100);
const STOP_GRACE: Duration = Duration::from_millis(200);
const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const GATEWAY_CLIENT_NAME: &str = "hydra-gateway";
const GATEWAY_CLIENT_VERSION: &str = "1.0.0";

/// Lifecycle state of a [`ChildSupervisor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorStatus {
    Stopped,
    Starting,
    Ready,
    Error,
}

impl SupervisorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

/// Opaque tool descriptor as reported by the child itself.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

impl ToolDescriptor {
    fn from_value(v: &Value) -> Option<Self> {
        let name = v.get("name")?.as_str()?.to_string();
        let description = v
            .get("description")
            .and_then(|d| d.as_str())
            .map(str::to_string);
        let input_schema = v.get("inputSchema").cloned().unwrap_or_else(|| json!({}));
        Some(Self {
            name,
            description,
            input_schema,
        })
    }
}

/// Immutable point-in-time view of a supervisor, safe to hand out freely.
#[derive(Debug, Clone)]
pub struct SupervisorSnapshot {
    pub id: String,
    pub name: String,
    pub status: SupervisorStatus,
    pub tools: Vec<ToolDescriptor>,
    pub error: Option<String>,
    pub pid: Option<u32>,
}

struct MutableState {
    status: SupervisorStatus,
    tools: Vec<ToolDescriptor>,
    error: Option<String>,
    pid: Option<u32>,
}

type Pending = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, SupervisorError>>>>>;

/// Owns one child process across its entire lifetime. A terminal `error` or
/// `stopped` supervisor is never respawned in place — callers construct a new
/// one (see `GatewayManager::refresh`).
pub struct ChildSupervisor {
    spec: ChildSpec,
    startup_timeout: Duration,
    request_timeout: Duration,
    state: Arc<RwLock<MutableState>>,
    next_id: AtomicI64,
    pending: Pending,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    process: Arc<Mutex<Option<Child>>>,
}

impl ChildSupervisor {
    pub fn new(spec: ChildSpec, startup_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            spec,
            startup_timeout,
            request_timeout,
            state: Arc::new(RwLock::new(MutableState {
                status: SupervisorStatus::Stopped,
                tools: Vec::new(),
                error: None,
                pid: None,
            })),
            next_id: AtomicI64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            stdin: Arc::new(Mutex::new(None)),
            process: Arc::new(Mutex::new(None)),
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub async fn state(&self) -> SupervisorSnapshot {
        let s = self.state.read().await;
        SupervisorSnapshot {
            id: self.spec.id.clone(),
            name: self.spec.name.clone(),
            status: s.status,
            tools: s.tools.clone(),
            error: s.error.clone(),
            pid: s.pid,
        }
    }

    /// Spawn the process and run the handshake to completion, or fail.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        {
            let mut s = self.state.write().await;
            if matches!(s.status, SupervisorStatus::Starting | SupervisorStatus::Ready) {
                return Err(SupervisorError::AlreadyRunning);
            }
            s.status = SupervisorStatus::Starting;
            s.error = None;
            s.tools = Vec::new();
        }

        match timeout(self.startup_timeout, self.run_startup_sequence()).await {
            Ok(Ok(tools)) => {
                let mut s = self.state.write().await;
                s.tools = tools;
                s.status = SupervisorStatus::Ready;
                tracing::info!(child = %self.spec.name, "child ready");
                Ok(())
            }
            Ok(Err(err)) => {
                self.fail(&err).await;
                Err(err)
            }
            Err(_) => {
                let err = SupervisorError::HandshakeTimeout;
                self.fail(&err).await;
                Err(err)
            }
        }
    }

    async fn fail(&self, err: &SupervisorError) {
        let mut s = self.state.write().await;
        s.status = SupervisorStatus::Error;
        s.error = Some(err.to_string());
        drop(s);
        self.kill_process().await;
    }

    async fn run_startup_sequence(&self) -> Result<Vec<ToolDescriptor>, SupervisorError> {
        let mut env: HashMap<String, String> = std::env::vars().collect();
        for (k, v) in &self.spec.env {
            env.insert(k.clone(), v.clone());
        }

        let mut command = Command::new(&self.spec.command);
        command
            .args(&self.spec.args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| SupervisorError::SpawnFailed(e.to_string()))?;

        tokio::time::sleep(STARTUP_PROBE).await;
        if let Ok(Some(status)) = child.try_wait() {
            return Err(SupervisorError::SpawnFailed(format!(
                "process exited immediately ({status})"
            )));
        }

        let pid = child.id();
        {
            let mut s = self.state.write().await;
            s.pid = pid;
        }

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SupervisorError::SpawnFailed("no stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::SpawnFailed("no stdout handle".to_string()))?;
        let stderr = child.stderr.take();

        *self.stdin.lock().await = Some(stdin);
        *self.process.lock().await = Some(child);

        self.spawn_reader_task(stdout);
        if let Some(stderr) = stderr {
            self.spawn_stderr_sink(stderr);
        }
        self.spawn_exit_watcher();

        let init_result = self
            .send_request(
                "initialize",
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "clientInfo": {
                        "name": GATEWAY_CLIENT_NAME,
                        "version": GATEWAY_CLIENT_VERSION,
                    },
                    "capabilities": { "roots": { "listChanged": true } },
                }),
            )
            .await;
        if let Err(err) = init_result {
            return Err(handshake_error(err, SupervisorError::HandshakeTimeout));
        }

        self.send_notification("notifications/initialized", json!({}))
            .await
            .map_err(|e| SupervisorError::SpawnFailed(e.to_string()))?;

        let tools_result = self.send_request("tools/list", json!({})).await;
        let tools_value = match tools_result {
            Ok(v) => v,
            Err(err) => {
                return Err(SupervisorError::ToolsListFailed(err.to_string()));
            }
        };

        let tools = tools_value
            .get("tools")
            .and_then(|t| t.as_array())
            .map(|arr| arr.iter().filter_map(ToolDescriptor::from_value).collect())
            .unwrap_or_default();

        Ok(tools)
    }

    fn spawn_reader_task(&self, stdout: tokio::process::ChildStdout) {
        let pending = Arc::clone(&self.pending);
        let child_name = self.spec.name.clone();
        tokio::spawn(async move {
            let mut framer = LineFramer::new(stdout, child_name.clone());
            loop {
                match framer.next_message().await {
                    Ok(Some(msg)) => route_message(&pending, &child_name, msg).await,
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(child = %child_name, error = %err, "child stdout read error");
                        break;
                    }
                }
            }
        });
    }

    fn spawn_stderr_sink(&self, stderr: tokio::process::ChildStderr) {
        let child_name = self.spec.name.clone();
        tokio::spawn(async move {
            use tokio::io::{AsyncBufReadExt, BufReader};
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::info!(child = %child_name, stderr = %line, "child stderr");
            }
        });
    }

    /// Polls the child's exit status in the background. On an exit that was
    /// not preceded by `stop()`, transitions to `error` and rejects every
    /// pending waiter with `ServerStopped` — this is the only path by which
    /// a live supervisor discovers its child died without a caller having to
    /// make another request first.
    fn spawn_exit_watcher(&self) {
        let process = Arc::clone(&self.process);
        let pending = Arc::clone(&self.pending);
        let state = Arc::clone(&self.state);
        let child_name = self.spec.name.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let mut guard = process.lock().await;
                let status = match guard.as_mut() {
                    Some(child) => child.try_wait().ok().flatten(),
                    None => break,
                };
                drop(guard);
                let Some(status) = status else { continue };

                let mut s = state.write().await;
                if s.status != SupervisorStatus::Ready {
                    // Already stopped/errored deliberately; nothing to do.
                    break;
                }
                let code = status.code().unwrap_or(-1);
                s.status = SupervisorStatus::Error;
                s.error = Some(format!("Process exited unexpectedly (code: {code})"));
                drop(s);

                tracing::warn!(child = %child_name, code, "child process exited unexpectedly");
                let mut pending_guard = pending.lock().await;
                for (_, sender) in pending_guard.drain() {
                    let _ = sender.send(Err(SupervisorError::ServerStopped));
                }
                drop(pending_guard);
                break;
            }
        });
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, SupervisorError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let envelope = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        if let Err(err) = self.write_envelope(&envelope).await {
            self.pending.lock().await.remove(&id);
            return Err(SupervisorError::SpawnFailed(err.to_string()));
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(SupervisorError::ServerStopped),
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> std::io::Result<()> {
        let envelope = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.write_envelope(&envelope).await
    }

    async fn write_envelope(&self, envelope: &Value) -> std::io::Result<()> {
        let mut guard = self.stdin.lock().await;
        match guard.as_mut() {
            Some(stdin) => write_line(stdin, envelope).await,
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin not writable",
            )),
        }
    }

    /// Invoke a tool call on the child, by its original (non-namespaced) name.
    pub async fn call_tool(
        &self,
        original_name: &str,
        arguments: Value,
    ) -> Result<Value, SupervisorError> {
        {
            let s = self.state.read().await;
            if s.status != SupervisorStatus::Ready {
                return Err(SupervisorError::NotReady);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let envelope = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": original_name, "arguments": arguments },
        });

        if let Err(err) = self.write_envelope(&envelope).await {
            self.pending.lock().await.remove(&id);
            return Err(SupervisorError::SpawnFailed(err.to_string()));
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SupervisorError::ServerStopped),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(SupervisorError::RequestTimeout)
            }
        }
    }

    /// Idempotent. Rejects all pending waiters, closes stdin, and kills the
    /// process after a short grace window if it hasn't exited on its own.
    pub async fn stop(&self) {
        {
            let mut s = self.state.write().await;
            s.status = SupervisorStatus::Stopped;
            s.tools.clear();
        }

        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(SupervisorError::ServerStopped));
        }
        drop(pending);

        *self.stdin.lock().await = None;
        self.kill_process().await;
    }

    async fn kill_process(&self) {
        tokio::time::sleep(STOP_GRACE).await;
        let mut guard = self.process.lock().await;
        if let Some(child) = guard.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill().await;
            }
        }
    }
}

fn handshake_error(err: SupervisorError, fallback: SupervisorError) -> SupervisorError {
    match err {
        SupervisorError::RequestTimeout => fallback,
        other => other,
    }
}

async fn route_message(pending: &Pending, child_name: &str, msg: Value) {
    match msg.get("id").and_then(Value::as_i64) {
        Some(id) => {
            let sender = pending.lock().await.remove(&id);
            match sender {
                Some(sender) => {
                    let result = if let Some(err) = msg.get("error") {
                        let message = err
                            .get("message")
                            .and_then(|m| m.as_str())
                            .unwrap_or("unknown error")
                            .to_string();
                        Err(SupervisorError::Remote(message))
                    } else {
                        Ok(msg.get("result").cloned().unwrap_or(Value::Null))
                    };
                    let _ = sender.send(result);
                }
                None => {
                    tracing::warn!(child = %child_name, id, "dropping response with no matching waiter");
                }
            }
        }
        None => {
            tracing::debug!(child = %child_name, method = ?msg.get("method"), "dropping child notification (no subscriber)");
        }
    }
}
