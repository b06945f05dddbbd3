//! Default system prompt: persona, the inline tool-use format and the tools
//! offered by every connected server.

use crate::application::tooling::ToolRegistry;
use crate::application::xml::META_TOOL;
use std::fmt::Write;

const IDENTITY: &str = "You are a capable assistant with access to tools provided by connected MCP servers.";

const TOOL_USE: &str = "\
TOOL USE

You can call one tool per message and will receive its result in the next message. \
Prefer the provider's native function calling when it is available. Otherwise call a \
tool by answering with nothing but the following XML block:

<use_mcp_tool>
<server_name>server name here</server_name>
<tool_name>tool name here</tool_name>
<arguments>
{\"param\": \"value\"}
</arguments>
</use_mcp_tool>

The arguments must be a JSON object matching the tool's input schema.";

/// Builds the prompt used when none is configured.
pub fn default_system_prompt(registry: &ToolRegistry) -> String {
    let mut prompt = format!("{IDENTITY}\n\n{TOOL_USE}\n\n# Connected MCP Servers\n");
    if registry.is_empty() {
        prompt.push_str("\n(No MCP servers are connected; answer directly.)\n");
        return prompt;
    }

    let mut current: Option<&str> = None;
    for entry in registry.iter() {
        if current != Some(entry.server.as_str()) {
            let _ = write!(prompt, "\n## {}\n\n### Available Tools\n", entry.server);
            current = Some(entry.server.as_str());
        }
        let tool = &entry.descriptor;
        let _ = writeln!(prompt, "- {}: {}", tool.name, tool.description.trim());
        let schema = serde_json::to_string(&tool.input_schema).unwrap_or_default();
        let _ = writeln!(prompt, "    Input Schema: {schema}");
    }
    let _ = write!(
        prompt,
        "\nUse `{META_TOOL}` with one of the server names above to call these tools.\n"
    );
    prompt
}
