use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// Where a tool call was detected in the model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOrigin {
    /// Structured function-calling field of the provider response.
    Native,
    /// `<use_mcp_tool>` markup embedded in the response text.
    Inline,
}

/// A tool call requested by the assistant, kept in the transcript so it can
/// be replayed to the provider on follow-up requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub origin: CallOrigin,
}

impl ToolCallRequest {
    pub fn native(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            origin: CallOrigin::Native,
        }
    }

    pub fn inline(id: impl Into<String>, intent: ToolCallIntent) -> Self {
        Self {
            id: id.into(),
            name: intent.tool_name,
            arguments: intent.arguments,
            origin: CallOrigin::Inline,
        }
    }

    pub fn intent(&self) -> ToolCallIntent {
        ToolCallIntent {
            tool_name: self.name.clone(),
            arguments: self.arguments.clone(),
            server: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        tool_name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
        origin: CallOrigin,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        ChatMessage::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    /// Tool result answering `call`.
    pub fn tool_result(call: &ToolCallRequest, content: impl Into<String>, is_error: bool) -> Self {
        ChatMessage::Tool {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: content.into(),
            is_error,
            origin: call.origin,
        }
    }

    pub fn role(&self) -> MessageRole {
        match self {
            ChatMessage::System { .. } => MessageRole::System,
            ChatMessage::User { .. } => MessageRole::User,
            ChatMessage::Assistant { .. } => MessageRole::Assistant,
            ChatMessage::Tool { .. } => MessageRole::Tool,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ChatMessage::System { content }
            | ChatMessage::User { content }
            | ChatMessage::Assistant { content, .. }
            | ChatMessage::Tool { content, .. } => content,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            ChatMessage::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// Normalized request to invoke a tool, independent of how it was detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallIntent {
    pub tool_name: String,
    pub arguments: Value,
    /// Server named by the caller, if any (`use_mcp_tool` carries one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

impl ToolCallIntent {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            server: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

/// Servers may send `"description": null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub content: Value,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: serde_json::json!([{ "type": "text", "text": text.into() }]),
            is_error: false,
        }
    }

    /// Text fed back to the model: the text content blocks joined by newlines,
    /// or the JSON encoding of `content` when it carries no text blocks.
    pub fn render(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            Value::Array(blocks) => {
                let texts: Vec<&str> = blocks
                    .iter()
                    .filter(|block| {
                        block
                            .get("type")
                            .and_then(Value::as_str)
                            .map(|kind| kind.eq_ignore_ascii_case("text"))
                            .unwrap_or(false)
                    })
                    .filter_map(|block| block.get("text").and_then(Value::as_str))
                    .collect();
                if texts.is_empty() {
                    self.content.to_string()
                } else {
                    texts.join("\n")
                }
            }
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_joins_text_blocks() {
        let result = ToolResult {
            content: json!([
                { "type": "text", "text": "first" },
                { "type": "image", "data": "..." },
                { "type": "text", "text": "second" }
            ]),
            is_error: false,
        };
        assert_eq!(result.render(), "first\nsecond");
    }

    #[test]
    fn render_falls_back_to_json() {
        let result = ToolResult {
            content: json!({ "rows": 3 }),
            is_error: false,
        };
        assert_eq!(result.render(), r#"{"rows":3}"#);
    }

    #[test]
    fn descriptor_defaults_missing_schema() {
        let descriptor: ToolDescriptor =
            serde_json::from_value(json!({ "name": "ping" })).expect("descriptor");
        assert_eq!(descriptor.description, "");
        assert_eq!(descriptor.input_schema["type"], "object");
    }

    #[test]
    fn descriptor_accepts_null_description() {
        let descriptor: ToolDescriptor = serde_json::from_value(json!({
            "name": "ping",
            "description": null,
            "inputSchema": { "type": "object" }
        }))
        .expect("descriptor");
        assert_eq!(descriptor.description, "");
    }

    #[test]
    fn tool_result_correlates_to_call() {
        let call = ToolCallRequest::native("call_1", "echo", json!({ "text": "hi" }));
        let message = ChatMessage::tool_result(&call, "hi", false);
        assert_eq!(message.role(), MessageRole::Tool);
        match message {
            ChatMessage::Tool { tool_call_id, tool_name, .. } => {
                assert_eq!(tool_call_id, "call_1");
                assert_eq!(tool_name, "echo");
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
