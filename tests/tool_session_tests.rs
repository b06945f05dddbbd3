// Stdio MCP session startup behaviour against real child processes

use relay_mcp_client::config::ServerConfig;
use relay_mcp_client::tooling::{McpProcess, ToolHub, ToolInvokeError};
use std::collections::HashMap;
use std::path::PathBuf;

fn server(name: &str, command: &str) -> ServerConfig {
    ServerConfig {
        name: name.into(),
        command: PathBuf::from(command),
        args: Vec::new(),
        env: HashMap::new(),
        workdir: None,
        auto_approve: Vec::new(),
    }
}

#[tokio::test]
async fn missing_executable_fails_to_spawn() {
    let result = McpProcess::connect(server("ghost", "/nonexistent/relay-mcp-server")).await;
    assert!(matches!(result, Err(ToolInvokeError::Spawn { ref server, .. }) if server == "ghost"));
}

#[tokio::test]
async fn any_failed_server_aborts_startup() {
    let result = ToolHub::connect(&[server("ghost", "/nonexistent/relay-mcp-server")]).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn empty_server_list_gives_empty_registry() {
    let hub = ToolHub::connect(&[]).await.expect("hub");
    assert!(hub.registry().is_empty());
    assert!(hub.server_names().is_empty());
}

/// `cat` echoes our `initialize` request back. The client answers it as an
/// unsupported server request with -32601, and `cat` echoes that reply as
/// the response to `initialize`.
#[cfg(unix)]
#[tokio::test]
async fn handshake_surfaces_json_rpc_errors() {
    let result = McpProcess::connect(server("echoer", "cat")).await;
    assert!(matches!(result, Err(ToolInvokeError::Rpc { code: -32601, .. })));
}
