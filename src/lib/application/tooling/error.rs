use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("MCP server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("MCP server '{server}' is closed")]
    Closed { server: String },
    #[error("MCP server name '{server}' is used by more than one session")]
    DuplicateServer { server: String },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool requested: {0}")]
    UnknownTool(String),
    #[error("tool '{tool}' belongs to server '{server}' which is not connected")]
    Disconnected { tool: String, server: String },
    #[error("failed to execute tool '{tool}': {source}")]
    Execution {
        tool: String,
        #[source]
        source: ToolInvokeError,
    },
}

impl ToolError {
    pub fn user_message(&self) -> String {
        match self {
            ToolError::UnknownTool(name) => {
                format!("tool invocation failed: no connected server provides \"{name}\"")
            }
            ToolError::Disconnected { tool, server } => {
                format!("tool invocation failed: \"{tool}\" needs server \"{server}\", which is not connected")
            }
            ToolError::Execution { tool, source } => {
                format!("tool invocation failed: \"{tool}\": {source}")
            }
        }
    }
}
