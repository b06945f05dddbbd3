use async_trait::async_trait;
use serde_json::Value;

use super::error::ToolInvokeError;
use crate::types::{ToolDescriptor, ToolResult};

/// A connected tool server. The orchestration loop only needs to list and
/// call tools; how the session talks to its server is its own business.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Server name as configured in the server list.
    fn server_name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ToolInvokeError>;

    async fn close(&self);
}
