//! Anthropic Messages API adapter.

use super::error::AdapterError;
use super::transport::{ChatTransport, HttpRequest, build_url};
use super::{AssistantTurn, ProviderAdapter, ProviderKind, TurnBlock, inline_result_text, new_call_id};
use crate::application::tooling::ToolRegistry;
use crate::config::ProviderSettings;
use crate::types::{CallOrigin, ChatMessage, ToolCallRequest};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};

const MESSAGES_PATH: &str = "v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicAdapter {
    model: String,
    endpoint: String,
    api_key: Option<String>,
    api_key_env: String,
    max_tokens: u32,
    transport: Arc<dyn ChatTransport>,
}

impl AnthropicAdapter {
    pub fn new(
        settings: &ProviderSettings,
        api_key: Option<String>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            model: settings.model.clone(),
            endpoint: settings.endpoint.clone(),
            api_key,
            api_key_env: settings.api_key_env.clone(),
            max_tokens: settings.max_tokens,
            transport,
        }
    }

    fn require_api_key(&self) -> Result<&str, AdapterError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AdapterError::missing_credential(ProviderKind::Anthropic, &self.api_key_env))
    }

    /// The API rejects `tool_use`/`tool_result` blocks unless the request also
    /// carries tool definitions, so the schema stays attached once the
    /// transcript holds tool traffic.
    pub fn build_request(
        &self,
        api_key: &str,
        transcript: &[ChatMessage],
        tools: &ToolRegistry,
        offer_tools: bool,
    ) -> HttpRequest {
        let system: Vec<&str> = transcript
            .iter()
            .filter_map(|message| match message {
                ChatMessage::System { content } if !content.is_empty() => Some(content.as_str()),
                _ => None,
            })
            .collect();

        let mut body = Map::new();
        body.insert("model".into(), json!(self.model));
        body.insert("max_tokens".into(), json!(self.max_tokens));
        if !system.is_empty() {
            body.insert("system".into(), json!(system.join("\n\n")));
        }
        body.insert("messages".into(), Value::Array(encode_messages(transcript)));

        let has_tool_traffic = transcript
            .iter()
            .any(|message| native_tool_traffic(message));
        if !tools.is_empty() && (offer_tools || has_tool_traffic) {
            body.insert(
                "tools".into(),
                Value::Array(tools.to_provider_schema(ProviderKind::Anthropic)),
            );
        }

        HttpRequest::new(
            ProviderKind::Anthropic,
            build_url(&self.endpoint, MESSAGES_PATH),
            Value::Object(body),
        )
        .with_header("x-api-key", api_key)
        .with_header("anthropic-version", API_VERSION)
    }

    pub fn parse_response(&self, body: Value) -> Result<AssistantTurn, AdapterError> {
        let response: MessagesResponse = serde_json::from_value(body).map_err(|err| {
            AdapterError::invalid_response(ProviderKind::Anthropic, err.to_string())
        })?;

        let blocks = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(TurnBlock::Text(text)),
                ContentBlock::ToolUse { id, name, input } => {
                    let id = if id.is_empty() { new_call_id() } else { id };
                    Some(TurnBlock::ToolCall(ToolCallRequest::native(id, name, input)))
                }
                ContentBlock::Other => None,
            })
            .collect();
        debug!(stop_reason = ?response.stop_reason, "Parsed Anthropic response");
        Ok(AssistantTurn { blocks })
    }
}

fn native_tool_traffic(message: &ChatMessage) -> bool {
    match message {
        ChatMessage::Assistant { tool_calls, .. } => tool_calls
            .iter()
            .any(|call| call.origin == CallOrigin::Native),
        ChatMessage::Tool { origin, .. } => *origin == CallOrigin::Native,
        _ => false,
    }
}

/// Encodes the conversation as content-block messages. Consecutive messages
/// with the same role are merged, which keeps several `tool_result` blocks in
/// one user turn.
fn encode_messages(transcript: &[ChatMessage]) -> Vec<Value> {
    let mut encoded: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for message in transcript {
        let (role, blocks) = match message {
            ChatMessage::System { .. } => continue,
            ChatMessage::User { content } => ("user", vec![text_block(content)]),
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut blocks = Vec::new();
                if !content.is_empty() {
                    blocks.push(text_block(content));
                }
                for call in tool_calls.iter().filter(|c| c.origin == CallOrigin::Native) {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": tool_input(&call.arguments),
                    }));
                }
                ("assistant", blocks)
            }
            ChatMessage::Tool {
                tool_call_id,
                tool_name,
                content,
                is_error,
                origin,
            } => {
                let block = match origin {
                    CallOrigin::Native => {
                        let mut block = json!({
                            "type": "tool_result",
                            "tool_use_id": tool_call_id,
                            "content": content,
                        });
                        if *is_error {
                            block["is_error"] = json!(true);
                        }
                        block
                    }
                    CallOrigin::Inline => text_block(&inline_result_text(tool_name, content)),
                };
                ("user", vec![block])
            }
        };

        if blocks.is_empty() {
            continue;
        }
        match encoded.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
            _ => encoded.push((role, blocks)),
        }
    }

    encoded
        .into_iter()
        .map(|(role, content)| json!({ "role": role, "content": content }))
        .collect()
}

fn text_block(text: &str) -> Value {
    json!({ "type": "text", "text": text })
}

/// `tool_use.input` must be an object.
fn tool_input(arguments: &Value) -> Value {
    match arguments {
        Value::Object(_) => arguments.clone(),
        _ => Value::Object(Map::new()),
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn ensure_configured(&self) -> Result<(), AdapterError> {
        self.require_api_key().map(|_| ())
    }

    async fn complete(
        &self,
        transcript: &[ChatMessage],
        tools: &ToolRegistry,
        offer_tools: bool,
    ) -> Result<AssistantTurn, AdapterError> {
        let api_key = self.require_api_key()?;
        let request = self.build_request(api_key, transcript, tools, offer_tools);

        info!(
            provider = "anthropic",
            model = self.model.as_str(),
            messages = transcript.len(),
            tools = request.body.get("tools").is_some(),
            "Sending request to Anthropic"
        );
        let body = self.transport.post_json(request).await?;
        self.parse_response(body)
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}
