//! Provider infrastructure module
//!
//! One adapter per LLM backend, all behind [`ProviderAdapter`] so the
//! orchestration loop drives every backend the same way.
//!
//! # Structure
//! - `error` - AdapterError
//! - `transport` - HTTP transport trait and reqwest implementation
//! - `openai` - OpenAI-compatible adapter (OpenAI, DeepSeek)
//! - `anthropic` - Anthropic Messages API adapter
//! - `factory` - AdapterSet built from configuration

pub mod anthropic;
pub mod error;
pub mod factory;
pub mod openai;
pub mod transport;

pub use anthropic::AnthropicAdapter;
pub use error::AdapterError;
pub use factory::{AdapterSet, resolve_api_key};
pub use openai::OpenAiCompatibleAdapter;
pub use transport::{ChatTransport, HttpRequest, ReqwestTransport};

use crate::application::tooling::ToolRegistry;
use crate::types::{ChatMessage, ToolCallRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    DeepSeek,
}

impl ProviderKind {
    pub fn all() -> &'static [ProviderKind] {
        &[ProviderKind::Anthropic, ProviderKind::OpenAi, ProviderKind::DeepSeek]
    }

    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::DeepSeek => "deepseek",
        }
    }

    /// Query prefix that routes a query to this provider.
    pub fn directive(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "/anthropic",
            ProviderKind::OpenAi => "/openai",
            ProviderKind::DeepSeek => "/deepseek",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.id().eq_ignore_ascii_case(id.trim()))
    }

    /// OpenAI-style `{type: "function", function: {...}}` tool schema.
    pub fn uses_function_envelope(self) -> bool {
        !matches!(self, ProviderKind::Anthropic)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One piece of an assistant response, in the order the provider sent it.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnBlock {
    Text(String),
    ToolCall(ToolCallRequest),
}

/// A parsed model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantTurn {
    pub blocks: Vec<TurnBlock>,
}

impl AssistantTurn {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            blocks: vec![TurnBlock::Text(text.into())],
        }
    }

    /// Text blocks joined by newlines; empty blocks are skipped.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                TurnBlock::Text(text) if !text.is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_calls(&self) -> Vec<ToolCallRequest> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                TurnBlock::ToolCall(call) => Some(call.clone()),
                TurnBlock::Text(_) => None,
            })
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.blocks
            .iter()
            .any(|block| matches!(block, TurnBlock::ToolCall(_)))
    }
}

/// Generates an id for a tool call the provider did not label.
pub fn new_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// A chat backend. Adapters translate the shared transcript into their wire
/// format and parse responses back into [`AssistantTurn`]s.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    /// False when the configured model cannot do function calling. Such an
    /// adapter never sends a tool schema and never reports tool calls.
    fn supports_tools(&self) -> bool;

    /// Fails when the credential is missing, before any network traffic.
    fn ensure_configured(&self) -> Result<(), AdapterError>;

    /// Sends the transcript. `offer_tools` is false once the round limit is
    /// reached.
    async fn complete(
        &self,
        transcript: &[ChatMessage],
        tools: &ToolRegistry,
        offer_tools: bool,
    ) -> Result<AssistantTurn, AdapterError>;
}

/// Text sent back to the model for a tool call that arrived as inline markup.
pub(crate) fn inline_result_text(tool_name: &str, content: &str) -> String {
    format!("[use_mcp_tool for '{tool_name}'] Result:\n{content}")
}
