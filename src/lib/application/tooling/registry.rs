//! Flattened catalogue of the tools advertised by every connected server.

use crate::infrastructure::provider::ProviderKind;
use crate::types::ToolDescriptor;
use serde_json::{Value, json};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredTool {
    pub server: String,
    pub descriptor: ToolDescriptor,
}

/// Tools in registration order. Names are not deduplicated; lookups by bare
/// name return the earliest registration.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, server: &str, descriptors: Vec<ToolDescriptor>) {
        for descriptor in descriptors {
            if let Some(existing) = self.resolve(&descriptor.name) {
                warn!(
                    tool = %descriptor.name,
                    first_server = %existing.server,
                    server,
                    "Tool name registered by more than one server; bare lookups use the first"
                );
            }
            self.entries.push(RegisteredTool {
                server: server.to_string(),
                descriptor,
            });
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&RegisteredTool> {
        self.entries.iter().find(|entry| entry.descriptor.name == name)
    }

    /// Looks the tool up within `server` first, then across all servers.
    pub fn resolve_in(&self, server: Option<&str>, name: &str) -> Option<&RegisteredTool> {
        server
            .and_then(|server| {
                self.entries
                    .iter()
                    .find(|entry| entry.server == server && entry.descriptor.name == name)
            })
            .or_else(|| self.resolve(name))
    }

    pub fn to_provider_schema(&self, kind: ProviderKind) -> Vec<Value> {
        self.entries
            .iter()
            .map(|entry| {
                let tool = &entry.descriptor;
                if kind.uses_function_envelope() {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.input_schema,
                        }
                    })
                } else {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.input_schema,
                    })
                }
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.descriptor.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
