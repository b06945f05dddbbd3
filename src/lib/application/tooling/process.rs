//! Stdio MCP session: newline-delimited JSON-RPC 2.0 with a spawned server.

use super::error::ToolInvokeError;
use super::session::ToolSession;
use crate::config::ServerConfig;
use crate::types::{ToolDescriptor, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2025-06-18";

type Responder = oneshot::Sender<Result<Value, ToolInvokeError>>;

#[derive(Clone)]
pub struct McpProcess {
    inner: Arc<McpProcessInner>,
}

struct McpProcessInner {
    server: ServerConfig,
    child: AsyncMutex<Option<Child>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: AsyncMutex<HashMap<String, Responder>>,
    id_counter: AtomicU64,
    closed: AtomicBool,
}

#[derive(Deserialize)]
struct ToolListPage {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<String>,
}

impl McpProcess {
    /// Spawns the configured server and completes the MCP handshake.
    pub async fn connect(server: ServerConfig) -> Result<Self, ToolInvokeError> {
        let mut command = Command::new(&server.command);
        command
            .args(&server.args)
            .envs(&server.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &server.workdir {
            command.current_dir(dir);
        }

        debug!(server = %server.name, command = %server.command.display(), "Spawning MCP server");
        let mut child = command.spawn().map_err(|source| ToolInvokeError::Spawn {
            server: server.name.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            return Err(ToolInvokeError::Transport {
                server: server.name.clone(),
                message: "failed to capture server stdio".into(),
            });
        };

        let inner = Arc::new(McpProcessInner {
            server,
            child: AsyncMutex::new(Some(child)),
            writer: AsyncMutex::new(Some(BufWriter::new(stdin))),
            pending: AsyncMutex::new(HashMap::new()),
            id_counter: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        });

        let reader = Arc::clone(&inner);
        tokio::spawn(async move {
            reader.reader_loop(stdout).await;
        });

        let process = Self { inner };
        if let Err(err) = process.inner.initialize().await {
            process.close().await;
            return Err(err);
        }
        info!(server = %process.inner.server.name, "MCP server initialised");
        Ok(process)
    }
}

#[async_trait]
impl ToolSession for McpProcess {
    fn server_name(&self) -> &str {
        &self.inner.server.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.inner.send_request("tools/list", params).await?;
            let page: ToolListPage =
                serde_json::from_value(result).map_err(|source| ToolInvokeError::InvalidJson {
                    server: self.inner.server.name.clone(),
                    source,
                })?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        debug!(server = %self.inner.server.name, count = tools.len(), "Listed server tools");
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ToolInvokeError> {
        let params = json!({
            "name": name,
            "arguments": match arguments {
                Value::Null => Value::Object(Default::default()),
                other => other,
            }
        });
        let result = self.inner.send_request("tools/call", params).await?;
        serde_json::from_value(result).map_err(|source| ToolInvokeError::InvalidJson {
            server: self.inner.server.name.clone(),
            source,
        })
    }

    async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown().await;
        debug!(server = %self.inner.server.name, "MCP server closed");
    }
}

impl McpProcessInner {
    async fn initialize(&self) -> Result<(), ToolInvokeError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });
        self.send_request("initialize", params).await?;
        self.send_notification("notifications/initialized", json!({}))
            .await
    }

    async fn reader_loop(self: Arc<Self>, stdout: ChildStdout) {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(raw)) => {
                    if raw.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Value>(&raw) {
                        Ok(message) => self.dispatch_inbound(message).await,
                        Err(err) => {
                            warn!(server = %self.server.name, %err, "Ignoring non-JSON line from MCP server");
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(server = %self.server.name, %err, "Failed reading from MCP server");
                    break;
                }
            }
        }

        if !self.closed.load(Ordering::SeqCst) {
            warn!(server = %self.server.name, "MCP server stream ended");
        }
        self.fail_pending(|server| ToolInvokeError::Terminated { server })
            .await;
    }

    async fn dispatch_inbound(&self, message: Value) {
        let id = message.get("id").cloned();
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);

        let outcome = match (id, method) {
            (Some(id), Some(method)) => self.answer_server_request(id, &method).await,
            (Some(id), None) => {
                self.resolve_response(&id, message).await;
                Ok(())
            }
            (None, Some(method)) => {
                debug!(server = %self.server.name, method, "Notification from MCP server");
                Ok(())
            }
            (None, None) => Ok(()),
        };

        if let Err(err) = outcome {
            warn!(server = %self.server.name, %err, "Failed to answer MCP server request");
        }
    }

    async fn resolve_response(&self, id: &Value, message: Value) {
        let key = match id {
            Value::String(value) => value.clone(),
            Value::Number(number) => number.to_string(),
            _ => return,
        };
        let Some(responder) = self.pending.lock().await.remove(&key) else {
            debug!(server = %self.server.name, response_id = key, "Response for unknown request");
            return;
        };

        let outcome = match message.get("error") {
            Some(error) => Err(ToolInvokeError::Rpc {
                server: self.server.name.clone(),
                code: error.get("code").and_then(Value::as_i64).unwrap_or(-32000),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            }),
            None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = responder.send(outcome);
    }

    async fn answer_server_request(&self, id: Value, method: &str) -> Result<(), ToolInvokeError> {
        let reply = if method == "ping" {
            json!({ "jsonrpc": "2.0", "id": id, "result": {} })
        } else {
            warn!(server = %self.server.name, method, "Server sent unsupported request");
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {
                    "code": -32601,
                    "message": format!("client does not implement method '{method}'"),
                }
            })
        };
        self.write_message(&reply).await
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ToolInvokeError::Closed {
                server: self.server.name.clone(),
            });
        }

        let id = format!("req-{}", self.id_counter.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        if let Err(err) = self.write_message(&payload).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        rx.await.unwrap_or_else(|_| {
            Err(ToolInvokeError::Terminated {
                server: self.server.name.clone(),
            })
        })
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.write_message(&payload).await
    }

    async fn write_message(&self, message: &Value) -> Result<(), ToolInvokeError> {
        let mut encoded =
            serde_json::to_vec(message).map_err(|source| ToolInvokeError::InvalidJson {
                server: self.server.name.clone(),
                source,
            })?;
        encoded.push(b'\n');

        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or_else(|| ToolInvokeError::Closed {
            server: self.server.name.clone(),
        })?;
        let transport = |source: std::io::Error| ToolInvokeError::Transport {
            server: self.server.name.clone(),
            message: source.to_string(),
        };
        stream.write_all(&encoded).await.map_err(transport)?;
        stream.flush().await.map_err(transport)
    }

    async fn shutdown(&self) {
        self.writer.lock().await.take();
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(err) = child.kill().await {
                debug!(server = %self.server.name, %err, "MCP server already exited");
            }
        }
        self.fail_pending(|server| ToolInvokeError::Closed { server })
            .await;
    }

    async fn fail_pending(&self, error: impl Fn(String) -> ToolInvokeError) {
        let mut pending = self.pending.lock().await;
        for (_, responder) in pending.drain() {
            let _ = responder.send(Err(error(self.server.name.clone())));
        }
    }
}
