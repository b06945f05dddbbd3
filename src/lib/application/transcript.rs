//! Append-only conversation history shared by every provider request.
//!
//! The transcript is seeded with a single system message and only ever grows.
//! A tool result may be appended only when an earlier assistant message holds
//! an unanswered tool call with the same id; each call is answered once.

use crate::types::{ChatMessage, MessageRole};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("tool result '{id}' does not answer any pending assistant tool call")]
    UncorrelatedToolResult { id: String },
    #[error("tool call id '{id}' is already in use in this transcript")]
    DuplicateToolCallId { id: String },
}

#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    pending_calls: HashSet<String>,
    seen_calls: HashSet<String>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
            pending_calls: HashSet::new(),
            seen_calls: HashSet::new(),
        }
    }

    pub fn append(&mut self, message: ChatMessage) -> Result<(), TranscriptError> {
        match &message {
            ChatMessage::Assistant { tool_calls, .. } => {
                let mut batch = HashSet::new();
                for call in tool_calls {
                    if self.seen_calls.contains(&call.id) || !batch.insert(call.id.as_str()) {
                        return Err(TranscriptError::DuplicateToolCallId {
                            id: call.id.clone(),
                        });
                    }
                }
                for call in tool_calls {
                    self.seen_calls.insert(call.id.clone());
                    self.pending_calls.insert(call.id.clone());
                }
            }
            ChatMessage::Tool { tool_call_id, .. } => {
                if !self.pending_calls.remove(tool_call_id) {
                    return Err(TranscriptError::UncorrelatedToolResult {
                        id: tool_call_id.clone(),
                    });
                }
            }
            ChatMessage::System { .. } | ChatMessage::User { .. } => {}
        }
        self.messages.push(message);
        Ok(())
    }

    /// Whether any assistant message already used this tool call id.
    pub fn knows_call_id(&self, id: &str) -> bool {
        self.seen_calls.contains(id)
    }

    pub fn snapshot(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn system_prompt(&self) -> &str {
        self.messages
            .first()
            .map(ChatMessage::content)
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Tool calls still waiting for a result.
    pub fn has_pending_calls(&self) -> bool {
        !self.pending_calls.is_empty()
    }

    /// Whether any tool call or tool result has been recorded.
    pub fn has_tool_traffic(&self) -> bool {
        self.messages.iter().any(|message| {
            message.role() == MessageRole::Tool || !message.tool_calls().is_empty()
        })
    }
}
