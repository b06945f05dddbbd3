//! OpenAI-compatible chat completions adapter, shared by OpenAI and DeepSeek.

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
use tracing::{debug, info, warn};

const CHAT_PATH: &str = "chat/completions";

/// DeepSeek reasoning models reject function-calling requests.
pub fn function_calling_supported(kind: ProviderKind, model: &str, configured: Option<bool>) -> bool {
    configured.unwrap_or_else(|| {
        let model = model.to_ascii_lowercase();
        !(kind == ProviderKind::DeepSeek && (model.contains("reasoner") || model.contains("-r1")))
    })
}

#[derive(Clone)]
pub struct OpenAiCompatibleAdapter {
    kind: ProviderKind,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    api_key_env: String,
    max_tokens: u32,
    function_calling: bool,
    transport: Arc<dyn ChatTransport>,
}

impl OpenAiCompatibleAdapter {
    pub fn new(
        settings: &ProviderSettings,
        api_key: Option<String>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            kind: settings.kind,
            model: settings.model.clone(),
            endpoint: settings.endpoint.clone(),
            api_key,
            api_key_env: settings.api_key_env.clone(),
            max_tokens: settings.max_tokens,
            function_calling: function_calling_supported(
                settings.kind,
                &settings.model,
                settings.function_calling,
            ),
            transport,
        }
    }

    fn require_api_key(&self) -> Result<&str, AdapterError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AdapterError::missing_credential(self.kind, &self.api_key_env))
    }

    pub fn build_request(
        &self,
        api_key: &str,
        transcript: &[ChatMessage],
        tools: &ToolRegistry,
        offer_tools: bool,
    ) -> HttpRequest {
        let mut body = Map::new();
        body.insert("model".into(), json!(self.model));
        body.insert("max_tokens".into(), json!(self.max_tokens));
        body.insert(
            "messages".into(),
            Value::Array(self.encode_messages(transcript)),
        );
        if self.function_calling && offer_tools && !tools.is_empty() {
            body.insert("tools".into(), Value::Array(tools.to_provider_schema(self.kind)));
            body.insert("tool_choice".into(), json!("auto"));
        }

        HttpRequest::new(self.kind, build_url(&self.endpoint, CHAT_PATH), Value::Object(body))
            .with_header("Authorization", format!("Bearer {api_key}"))
    }

    fn encode_messages(&self, transcript: &[ChatMessage]) -> Vec<Value> {
        let encoded = transcript.iter().map(|message| self.encode_message(message));
        if self.function_calling {
            return encoded.collect();
        }
        merge_text_turns(encoded)
    }

    /// Native calls are replayed structurally; inline calls, and every call
    /// when function calling is off, are replayed as plain text.
    fn replays_natively(&self, origin: CallOrigin) -> bool {
        self.function_calling && origin == CallOrigin::Native
    }

    fn encode_message(&self, message: &ChatMessage) -> Value {
        match message {
            ChatMessage::System { content } => json!({ "role": "system", "content": content }),
            ChatMessage::User { content } => json!({ "role": "user", "content": content }),
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => {
                let native: Vec<Value> = tool_calls
                    .iter()
                    .filter(|call| self.replays_natively(call.origin))
                    .map(encode_tool_call)
                    .collect();
                if native.is_empty() {
                    json!({ "role": "assistant", "content": content })
                } else {
                    let content = if content.is_empty() {
                        Value::Null
                    } else {
                        json!(content)
                    };
                    json!({ "role": "assistant", "content": content, "tool_calls": native })
                }
            }
            ChatMessage::Tool {
                tool_call_id,
                tool_name,
                content,
                origin,
                ..
            } => {
                if self.replays_natively(*origin) {
                    json!({ "role": "tool", "tool_call_id": tool_call_id, "content": content })
                } else {
                    json!({ "role": "user", "content": inline_result_text(tool_name, content) })
                }
            }
        }
    }

    pub fn parse_response(&self, body: Value) -> Result<AssistantTurn, AdapterError> {
        let response: ChatCompletion = serde_json::from_value(body)
            .map_err(|err| AdapterError::invalid_response(self.kind, err.to_string()))?;
        let message = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .ok_or_else(|| AdapterError::invalid_response(self.kind, "missing message"))?;

        let mut blocks = Vec::new();
        if let Some(content) = message.content.filter(|c| !c.is_empty()) {
            blocks.push(TurnBlock::Text(content));
        }
        if self.function_calling {
            for call in message.tool_calls {
                blocks.push(TurnBlock::ToolCall(self.decode_tool_call(call)));
            }
        } else if !message.tool_calls.is_empty() {
            debug!(provider = %self.kind, "Ignoring tool calls from model without function calling");
        }
        Ok(AssistantTurn { blocks })
    }

    fn decode_tool_call(&self, call: WireToolCall) -> ToolCallRequest {
        let raw = call.function.arguments.unwrap_or_default();
        let arguments = if raw.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(
                    provider = %self.kind,
                    tool = %call.function.name,
                    %err,
                    "Tool call arguments are not valid JSON, keeping raw text"
                );
                Value::String(raw.clone())
            })
        };
        let id = call
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(new_call_id);
        ToolCallRequest::native(id, call.function.name, arguments)
    }
}

/// Reasoning models reject successive messages with the same role. Empty
/// assistant turns are dropped and adjacent same-role text is joined.
fn merge_text_turns(messages: impl Iterator<Item = Value>) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::new();
    for message in messages {
        let role = message["role"].as_str().unwrap_or_default();
        let content = message["content"].as_str().unwrap_or_default();
        if role == "assistant" && content.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(previous) if role != "system" && previous["role"] == role => {
                let joined = match previous["content"].as_str() {
                    Some(existing) if !existing.is_empty() => format!("{existing}\n\n{content}"),
                    _ => content.to_string(),
                };
                previous["content"] = json!(joined);
            }
            _ => merged.push(message),
        }
    }
    merged
}

fn encode_tool_call(call: &ToolCallRequest) -> Value {
    let arguments = match &call.arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    json!({
        "id": call.id,
        "type": "function",
        "function": { "name": call.name, "arguments": arguments }
    })
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_tools(&self) -> bool {
        self.function_calling
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
            provider = %self.kind,
            model = self.model.as_str(),
            messages = transcript.len(),
            tools = request.body.get("tools").is_some(),
            "Sending request to OpenAI-compatible provider"
        );
        let body = self.transport.post_json(request).await?;
        debug!(provider = %self.kind, "Received response from OpenAI-compatible provider");
        self.parse_response(body)
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: Option<String>,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    arguments: Option<String>,
}
