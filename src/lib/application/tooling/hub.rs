use super::error::{ToolError, ToolInvokeError};
use super::process::McpProcess;
use super::registry::ToolRegistry;
use super::session::ToolSession;
use crate::config::ServerConfig;
use crate::types::{ToolCallIntent, ToolResult};
use futures::future::{join_all, try_join_all};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Connected tool sessions plus the registry built from their tool lists.
pub struct ToolHub {
    registry: ToolRegistry,
    sessions: HashMap<String, Arc<dyn ToolSession>>,
    order: Vec<String>,
}

impl ToolHub {
    /// Connects every configured server concurrently. Any failure aborts the
    /// whole startup; sessions that did come up are closed again.
    pub async fn connect(configs: &[ServerConfig]) -> Result<Self, ToolInvokeError> {
        info!(count = configs.len(), "Connecting MCP servers");
        let outcomes = join_all(configs.iter().cloned().map(McpProcess::connect)).await;

        let mut sessions: Vec<Arc<dyn ToolSession>> = Vec::with_capacity(outcomes.len());
        let mut failure = None;
        for outcome in outcomes {
            match outcome {
                Ok(process) => sessions.push(Arc::new(process)),
                Err(err) if failure.is_none() => failure = Some(err),
                Err(err) => warn!(%err, "Additional MCP server failed to connect"),
            }
        }

        if let Some(err) = failure {
            for session in &sessions {
                session.close().await;
            }
            return Err(err);
        }
        Self::from_sessions(sessions).await
    }

    /// Lists the tools of already-connected sessions and builds the registry
    /// in session order.
    pub async fn from_sessions(sessions: Vec<Arc<dyn ToolSession>>) -> Result<Self, ToolInvokeError> {
        let mut names = HashSet::new();
        if let Some(duplicate) = sessions
            .iter()
            .map(|session| session.server_name())
            .find(|name| !names.insert(*name))
        {
            let err = ToolInvokeError::DuplicateServer {
                server: duplicate.to_string(),
            };
            for session in &sessions {
                session.close().await;
            }
            return Err(err);
        }

        let listings = try_join_all(sessions.iter().map(|session| session.list_tools())).await;
        let listings = match listings {
            Ok(listings) => listings,
            Err(err) => {
                for session in &sessions {
                    session.close().await;
                }
                return Err(err);
            }
        };

        let mut registry = ToolRegistry::new();
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for (session, tools) in sessions.into_iter().zip(listings) {
            let name = session.server_name().to_string();
            info!(
                server = %name,
                tools = ?tools.iter().map(|tool| tool.name.as_str()).collect::<Vec<_>>(),
                "Connected to server"
            );
            registry.register(&name, tools);
            map.insert(name.clone(), session);
            order.push(name);
        }

        Ok(Self {
            registry,
            sessions: map,
            order,
        })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn server_names(&self) -> &[String] {
        &self.order
    }

    /// Resolves the intent against the registry and calls the owning session.
    pub async fn invoke(&self, intent: &ToolCallIntent) -> Result<ToolResult, ToolError> {
        let Some(entry) = self
            .registry
            .resolve_in(intent.server.as_deref(), &intent.tool_name)
        else {
            warn!(requested_tool = %intent.tool_name, "Unknown tool requested");
            return Err(ToolError::UnknownTool(intent.tool_name.clone()));
        };

        let Some(session) = self.sessions.get(&entry.server) else {
            return Err(ToolError::Disconnected {
                tool: intent.tool_name.clone(),
                server: entry.server.clone(),
            });
        };

        let arguments = match &intent.arguments {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };

        debug!(tool = %intent.tool_name, server = %entry.server, "Dispatching tool via MCP");
        match session.call_tool(&intent.tool_name, arguments).await {
            Ok(result) => {
                info!(tool = %intent.tool_name, success = !result.is_error, "Tool executed");
                Ok(result)
            }
            Err(source) => {
                warn!(tool = %intent.tool_name, server = %entry.server, %source, "Tool execution failed");
                Err(ToolError::Execution {
                    tool: intent.tool_name.clone(),
                    source,
                })
            }
        }
    }

    pub async fn close_all(&self) {
        for name in &self.order {
            if let Some(session) = self.sessions.get(name) {
                session.close().await;
            }
        }
    }
}
