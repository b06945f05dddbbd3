//! Inline XML tool invocations.
//!
//! Models prompted with the XML tool-use format answer with markup such as
//!
//! ```text
//! <use_mcp_tool>
//! <server_name>api-server</server_name>
//! <tool_name>getUserPage</tool_name>
//! <arguments>{"pageNo":"1"}</arguments>
//! </use_mcp_tool>
//! ```
//!
//! Only text that is entirely such an invocation is considered. Parameters are
//! read one level deep; nested markup inside a parameter stays part of its value.

use crate::types::ToolCallIntent;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const META_TOOL: &str = "use_mcp_tool";
const ARGUMENTS_PARAM: &str = "arguments";

/// A parsed `<tool>...</tool>` block.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlInvocation {
    pub tool: String,
    /// Parameters in order of first occurrence; a repeated name keeps its
    /// position and takes the last value.
    pub params: Map<String, Value>,
}

impl XmlInvocation {
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Converts a `use_mcp_tool` invocation into a dispatchable intent.
    /// Other tags are reserved and yield `None`.
    pub fn dispatch(&self) -> Option<ToolCallIntent> {
        if self.tool != META_TOOL {
            debug!(tag = %self.tool, "XML invocation is not a dispatchable meta-tool");
            return None;
        }

        let server = self.param_str("server_name");
        let tool_name = self.param_str("tool_name").map(str::trim);
        let arguments = self.params.get(ARGUMENTS_PARAM);

        match (server, tool_name, arguments) {
            (Some(server), Some(tool_name), Some(arguments)) if !tool_name.is_empty() => {
                Some(ToolCallIntent {
                    tool_name: tool_name.to_string(),
                    arguments: arguments.clone(),
                    server: Some(server.trim().to_string()).filter(|name| !name.is_empty()),
                })
            }
            _ => {
                warn!("use_mcp_tool invocation is missing server_name, tool_name or arguments");
                None
            }
        }
    }
}

/// Returns `true` when the trimmed text is wrapped in angle brackets.
pub fn looks_like_invocation(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('<') && trimmed.ends_with('>')
}

/// Parses `text` as a single XML tool invocation.
pub fn extract_invocation(text: &str) -> Option<XmlInvocation> {
    let trimmed = text.trim();
    if !looks_like_invocation(trimmed) {
        return None;
    }

    let (tool, body_start) = first_opening_tag(trimmed, 0)?;
    let closing = format!("</{tool}>");
    let Some(body_end) = trimmed[body_start..].rfind(&closing).map(|pos| body_start + pos) else {
        debug!(tag = %tool, "opening tag has no matching closing tag");
        return None;
    };

    let params = parse_params(&trimmed[body_start..body_end]);
    Some(XmlInvocation {
        tool: tool.to_string(),
        params,
    })
}

/// Extracts a dispatchable `use_mcp_tool` intent from `text`, if any.
pub fn extract_intent(text: &str) -> Option<ToolCallIntent> {
    extract_invocation(text)?.dispatch()
}

fn parse_params(body: &str) -> Map<String, Value> {
    let mut params = Map::new();
    let mut cursor = 0;

    while let Some((name, value_start)) = first_opening_tag(body, cursor) {
        let closing = format!("</{name}>");
        match body[value_start..].find(&closing) {
            Some(offset) => {
                let raw = body[value_start..value_start + offset].trim();
                params.insert(name.to_string(), decode_param(name, raw));
                cursor = value_start + offset + closing.len();
            }
            None => {
                debug!(param = %name, "parameter tag is not closed; skipping");
                cursor = value_start;
            }
        }
    }

    params
}

fn decode_param(name: &str, raw: &str) -> Value {
    if name != ARGUMENTS_PARAM {
        return Value::String(raw.to_string());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, "arguments parameter is not valid JSON; keeping raw text");
            Value::String(raw.to_string())
        }
    }
}

/// Finds the first `<name>` tag at or after `from`, returning the tag name
/// and the byte offset just past its `>`.
fn first_opening_tag(text: &str, from: usize) -> Option<(&str, usize)> {
    let mut search = from;
    while let Some(offset) = text[search..].find('<') {
        let name_start = search + offset + 1;
        let name_len = text[name_start..]
            .char_indices()
            .take_while(|(index, ch)| {
                if *index == 0 {
                    ch.is_ascii_alphabetic() || *ch == '_'
                } else {
                    ch.is_ascii_alphanumeric() || *ch == '_'
                }
            })
            .map(|(_, ch)| ch.len_utf8())
            .sum::<usize>();
        let name_end = name_start + name_len;
        if name_len > 0 && text[name_end..].starts_with('>') {
            return Some((&text[name_start..name_end], name_end + 1));
        }
        search = name_start;
    }
    None
}
