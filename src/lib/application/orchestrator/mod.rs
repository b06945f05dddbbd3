//! # Orchestrator Module
//!
//! Drives one query from routing to final narration:
//! 1. Pick an adapter from the directive prefix (or the default provider)
//! 2. Append the query and ask the model
//! 3. Execute every tool call the model requested, appending one result each
//! 4. Ask again, up to `max_tool_rounds` times
//!
//! All providers share one [`Transcript`], so a conversation can switch
//! backend between queries.

mod route;

pub use route::{Route, is_quit_command};

use crate::application::tooling::ToolHub;
use crate::application::transcript::{Transcript, TranscriptError};
use crate::application::xml;
use crate::infrastructure::provider::{
    AdapterError, AdapterSet, AssistantTurn, ProviderAdapter, ProviderKind, new_call_id,
};
use crate::types::{CallOrigin, ChatMessage, ToolCallIntent, ToolCallRequest};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
    #[error("provider '{0}' is not configured")]
    ProviderUnavailable(ProviderKind),
    #[error("query for '{0}' is empty")]
    EmptyQuery(ProviderKind),
}

impl QueryError {
    pub fn user_message(&self) -> String {
        match self {
            QueryError::Adapter(err) => err.user_message(),
            QueryError::Transcript(err) => format!("Conversation state error: {err}"),
            QueryError::ProviderUnavailable(kind) => {
                format!("Provider '{kind}' is not available in this session.")
            }
            QueryError::EmptyQuery(kind) => {
                format!("Nothing to send: add your question after {}.", kind.directive())
            }
        }
    }
}

/// Line added to the narration for each tool call.
pub fn invocation_line(tool: &str, arguments: &Value) -> String {
    format!("[invoking tool {tool} with args {arguments}]")
}

/// A detected tool call plus the intent used to dispatch it. The intent can
/// carry a server name that the replayed call does not.
type PlannedCall = (ToolCallRequest, ToolCallIntent);

pub struct ChatSession {
    transcript: Transcript,
    hub: ToolHub,
    adapters: AdapterSet,
    default_provider: ProviderKind,
    max_tool_rounds: usize,
}

impl ChatSession {
    pub fn new(
        system_prompt: impl Into<String>,
        hub: ToolHub,
        adapters: AdapterSet,
        default_provider: ProviderKind,
    ) -> Self {
        Self {
            transcript: Transcript::new(system_prompt),
            hub,
            adapters,
            default_provider,
            max_tool_rounds: 1,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn hub(&self) -> &ToolHub {
        &self.hub
    }

    pub fn default_provider(&self) -> ProviderKind {
        self.default_provider
    }

    /// Runs one query and returns its narration. Failures are reported in the
    /// narration; the session stays usable.
    pub async fn process_query(&mut self, raw: &str) -> String {
        let query = raw.trim();
        if xml::looks_like_invocation(query) {
            if let Some(intent) = xml::extract_intent(query) {
                return self.run_direct(intent).await;
            }
            debug!("Query looks like markup but is not a dispatchable tool call");
        }

        let route = Route::parse(query, self.default_provider);
        match self.handle(route).await {
            Ok(narration) => narration,
            Err(err) => {
                warn!(%err, "Query failed");
                err.user_message()
            }
        }
    }

    /// Executes a tool invocation typed directly by the user. The transcript
    /// is left untouched.
    async fn run_direct(&self, intent: ToolCallIntent) -> String {
        info!(tool = %intent.tool_name, server = ?intent.server, "Running tool invocation from query");
        let line = invocation_line(&intent.tool_name, &intent.arguments);
        match self.hub.invoke(&intent).await {
            Ok(result) => format!("{line}\n{}", result.render()),
            Err(err) => format!("{line}\n{}", err.user_message()),
        }
    }

    pub async fn handle(&mut self, route: Route) -> Result<String, QueryError> {
        let adapter = self
            .adapters
            .get(route.provider)
            .ok_or(QueryError::ProviderUnavailable(route.provider))?;
        if route.text.is_empty() {
            return Err(QueryError::EmptyQuery(route.provider));
        }
        adapter.ensure_configured()?;

        info!(provider = %route.provider, model = adapter.model(), "Handling query");
        self.transcript.append(ChatMessage::user(route.text))?;
        self.drive(adapter).await
    }

    async fn drive(&mut self, adapter: Arc<dyn ProviderAdapter>) -> Result<String, QueryError> {
        let mut narration: Vec<String> = Vec::new();
        let mut rounds = 0;

        loop {
            let offer_tools =
                adapter.supports_tools() && !self.hub.registry().is_empty() && rounds < self.max_tool_rounds;
            let turn = adapter
                .complete(self.transcript.snapshot(), self.hub.registry(), offer_tools)
                .await?;
            let text = turn.text();
            let mut calls = self.detect_calls(adapter.as_ref(), &turn, &text);
            self.assign_unique_ids(&mut calls);

            if calls.is_empty() || rounds >= self.max_tool_rounds {
                if !calls.is_empty() {
                    warn!(
                        provider = %adapter.kind(),
                        dropped = calls.len(),
                        limit = self.max_tool_rounds,
                        "Tool round limit reached, ignoring further tool calls"
                    );
                }
                if !text.is_empty() {
                    narration.push(text.clone());
                }
                self.transcript.append(ChatMessage::assistant(text))?;
                return Ok(narration.join("\n"));
            }

            rounds += 1;
            let inline = calls.iter().any(|(call, _)| call.origin == CallOrigin::Inline);
            if !inline && !text.is_empty() {
                narration.push(text.clone());
            }
            let requests = calls.iter().map(|(call, _)| call.clone()).collect();
            self.transcript
                .append(ChatMessage::assistant_with_calls(text, requests))?;

            for (call, intent) in &calls {
                narration.push(invocation_line(&call.name, &call.arguments));
                let message = match self.hub.invoke(intent).await {
                    Ok(result) => ChatMessage::tool_result(call, result.render(), result.is_error),
                    Err(err) => {
                        let text = err.user_message();
                        narration.push(text.clone());
                        ChatMessage::tool_result(call, text, true)
                    }
                };
                self.transcript.append(message)?;
            }
            debug!(round = rounds, calls = calls.len(), "Tool round complete");
        }
    }

    /// Native calls win; otherwise a response that is entirely a
    /// `use_mcp_tool` invocation becomes one inline call.
    fn detect_calls(&self, adapter: &dyn ProviderAdapter, turn: &AssistantTurn, text: &str) -> Vec<PlannedCall> {
        if !adapter.supports_tools() {
            return Vec::new();
        }
        let native = turn.tool_calls();
        if !native.is_empty() {
            return native
                .into_iter()
                .map(|call| {
                    let intent = call.intent();
                    (call, intent)
                })
                .collect();
        }
        match xml::extract_intent(text.trim()) {
            Some(intent) => {
                debug!(tool = %intent.tool_name, "Detected inline tool invocation");
                vec![(ToolCallRequest::inline(new_call_id(), intent.clone()), intent)]
            }
            None => Vec::new(),
        }
    }

    /// Provider ids can repeat within a batch or across queries. Such calls
    /// get a fresh id so each one is answered by exactly one result.
    fn assign_unique_ids(&self, calls: &mut [PlannedCall]) {
        let mut batch = HashSet::new();
        for (call, _) in calls.iter_mut() {
            if self.transcript.knows_call_id(&call.id) || !batch.insert(call.id.clone()) {
                let fresh = new_call_id();
                debug!(provider_id = %call.id, id = %fresh, "Reassigning repeated tool call id");
                call.id = fresh;
                batch.insert(call.id.clone());
            }
        }
    }

    pub async fn shutdown(&self) {
        self.hub.close_all().await;
    }
}

#[cfg(test)]
mod tests;
