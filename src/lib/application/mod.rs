//! # Application Module
//!
//! Core logic of the client, independent of any particular LLM backend.
//!
//! ## Submodules
//!
//! - [`orchestrator`] - Routes queries and drives the tool-calling loop
//! - [`transcript`] - Conversation history shared by all providers
//! - [`xml`] - Inline `use_mcp_tool` invocations
//! - [`tooling`] - MCP server sessions and the tool registry
//! - [`prompt`] - Default system prompt
//! - [`stdio`] - Interactive command-line loop

pub mod orchestrator;
pub mod prompt;
pub mod stdio;
pub mod tooling;
pub mod transcript;
pub mod xml;
