use super::*;
use crate::application::tooling::{ToolInvokeError, ToolSession};
use crate::config::ProviderSettings;
use crate::infrastructure::provider::{
    AnthropicAdapter, ChatTransport, HttpRequest, OpenAiCompatibleAdapter,
};
use crate::types::{MessageRole, ToolDescriptor, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use tokio::sync::Mutex;

#[derive(Clone)]
struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Result<Value, AdapterError>>>>,
    recordings: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Value>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    fn with_results(responses: Vec<Result<Value, AdapterError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().collect())),
            recordings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn requests(&self) -> Vec<HttpRequest> {
        self.recordings.lock().await.clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<Value, AdapterError> {
        let provider = request.provider;
        self.recordings.lock().await.push(request);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(AdapterError::invalid_response(provider, "script exhausted")))
    }
}

struct StubSession {
    fail: bool,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl StubSession {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

#[async_trait]
impl ToolSession for StubSession {
    fn server_name(&self) -> &str {
        "utils"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        Ok(vec![ToolDescriptor::new(
            "echo",
            "Echo text back",
            json!({ "type": "object", "properties": { "text": { "type": "string" } } }),
        )])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ToolInvokeError> {
        self.calls.lock().await.push((name.to_string(), arguments.clone()));
        if self.fail {
            return Err(ToolInvokeError::Rpc {
                server: "utils".into(),
                code: -32000,
                message: "echo exploded".into(),
            });
        }
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(ToolResult::text(text))
    }

    async fn close(&self) {}
}

async fn hub(session: Arc<StubSession>) -> ToolHub {
    let sessions: Vec<Arc<dyn ToolSession>> = vec![session];
    ToolHub::from_sessions(sessions).await.expect("hub")
}

fn openai(transport: &ScriptedTransport, key: Option<&str>) -> Arc<dyn ProviderAdapter> {
    Arc::new(OpenAiCompatibleAdapter::new(
        &ProviderSettings::defaults_for(ProviderKind::OpenAi),
        key.map(String::from),
        Arc::new(transport.clone()),
    ))
}

fn deepseek(transport: &ScriptedTransport, model: &str) -> Arc<dyn ProviderAdapter> {
    let mut settings = ProviderSettings::defaults_for(ProviderKind::DeepSeek);
    settings.model = model.into();
    Arc::new(OpenAiCompatibleAdapter::new(
        &settings,
        Some("sk-deep".into()),
        Arc::new(transport.clone()),
    ))
}

fn anthropic(transport: &ScriptedTransport) -> Arc<dyn ProviderAdapter> {
    Arc::new(AnthropicAdapter::new(
        &ProviderSettings::defaults_for(ProviderKind::Anthropic),
        Some("sk-ant".into()),
        Arc::new(transport.clone()),
    ))
}

fn openai_tool_calls(calls: &[(&str, &str)]) -> Value {
    let calls: Vec<Value> = calls
        .iter()
        .map(|(id, text)| {
            json!({
                "id": id,
                "type": "function",
                "function": { "name": "echo", "arguments": json!({ "text": text }).to_string() }
            })
        })
        .collect();
    json!({ "choices": [{ "message": { "content": null, "tool_calls": calls } }] })
}

fn openai_text(text: &str) -> Value {
    json!({ "choices": [{ "message": { "content": text } }] })
}

const ECHO_XML: &str = "<use_mcp_tool>\n<server_name>utils</server_name>\n<tool_name>echo</tool_name>\n<arguments>{\"text\":\"ping\"}</arguments>\n</use_mcp_tool>";

#[tokio::test]
async fn tool_batch_gets_exactly_one_follow_up() {
    let transport = ScriptedTransport::new(vec![
        openai_tool_calls(&[("call_a", "one"), ("call_b", "two")]),
        openai_text("Both echoed."),
    ]);
    let session = StubSession::new(false);
    let mut chat = ChatSession::new(
        "sys",
        hub(session.clone()).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    );

    let narration = chat.process_query("echo twice").await;

    assert_eq!(
        narration,
        "[invoking tool echo with args {\"text\":\"one\"}]\n\
         [invoking tool echo with args {\"text\":\"two\"}]\n\
         Both echoed."
    );
    let requests = transport.requests().await;
    assert_eq!(requests.len(), 2);
    assert!(requests[0].body.get("tools").is_some());
    assert!(requests[1].body.get("tools").is_none());

    let follow_up = requests[1].body["messages"].as_array().cloned().unwrap_or_default();
    let tool_messages: Vec<_> = follow_up.iter().filter(|m| m["role"] == "tool").collect();
    assert_eq!(tool_messages.len(), 2);
    assert_eq!(tool_messages[0]["tool_call_id"], "call_a");
    assert_eq!(tool_messages[1]["content"], "two");

    let roles: Vec<_> = chat.transcript().snapshot().iter().map(|m| m.role()).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Tool,
            MessageRole::Assistant,
        ]
    );
    assert!(!chat.transcript().has_pending_calls());
    assert_eq!(session.calls.lock().await.len(), 2);
}

#[tokio::test]
async fn anthropic_echo_narrates_invocation_then_answer() {
    let transport = ScriptedTransport::new(vec![
        json!({
            "content": [
                { "type": "text", "text": "I'll echo that." },
                { "type": "tool_use", "id": "toolu_1", "name": "echo", "input": { "text": "hello" } }
            ],
            "stop_reason": "tool_use"
        }),
        json!({ "content": [{ "type": "text", "text": "You said hello." }], "stop_reason": "end_turn" }),
    ]);
    let mut chat = ChatSession::new(
        "sys",
        hub(StubSession::new(false)).await,
        AdapterSet::new(vec![anthropic(&transport)]),
        ProviderKind::Anthropic,
    );

    let narration = chat.process_query("say hello").await;

    assert_eq!(
        narration,
        "I'll echo that.\n[invoking tool echo with args {\"text\":\"hello\"}]\nYou said hello."
    );
    let requests = transport.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].body["messages"][2]["content"][0]["type"], "tool_result");
    assert_eq!(requests[1].body["messages"][2]["content"][0]["content"], "hello");
    assert!(requests[1].body.get("tools").is_some());
}

#[tokio::test]
async fn gated_model_gets_no_schema_and_no_tool_execution() {
    let transport = ScriptedTransport::new(vec![json!({
        "choices": [{ "message": {
            "content": ECHO_XML,
            "tool_calls": [{ "id": "c1", "function": { "name": "echo", "arguments": "{}" } }]
        }}]
    })]);
    let session = StubSession::new(false);
    let mut chat = ChatSession::new(
        "sys",
        hub(session.clone()).await,
        AdapterSet::new(vec![deepseek(&transport, "deepseek-reasoner")]),
        ProviderKind::DeepSeek,
    );

    let narration = chat.process_query("think hard").await;

    assert_eq!(narration, ECHO_XML);
    let requests = transport.requests().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].body.get("tools").is_none());
    assert!(session.calls.lock().await.is_empty());
    assert!(!chat.transcript().has_tool_traffic());
}

#[tokio::test]
async fn missing_credential_fails_without_network_or_transcript_change() {
    let transport = ScriptedTransport::new(vec![openai_text("unused")]);
    let mut chat = ChatSession::new(
        "sys",
        hub(StubSession::new(false)).await,
        AdapterSet::new(vec![
            anthropic(&transport),
            openai(&transport, None),
        ]),
        ProviderKind::Anthropic,
    );

    let narration = chat.process_query("/openai hello").await;

    assert!(narration.contains("OPENAI_API_KEY"), "{narration}");
    assert!(transport.requests().await.is_empty());
    assert_eq!(chat.transcript().len(), 1);
}

#[tokio::test]
async fn inline_invocation_from_capable_model_is_executed_and_replayed_as_text() {
    let transport = ScriptedTransport::new(vec![openai_text(ECHO_XML), openai_text("Got ping back.")]);
    let session = StubSession::new(false);
    let mut chat = ChatSession::new(
        "sys",
        hub(session.clone()).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    );

    let narration = chat.process_query("ping it").await;

    assert_eq!(
        narration,
        "[invoking tool echo with args {\"text\":\"ping\"}]\nGot ping back."
    );
    let requests = transport.requests().await;
    let messages = &requests[1].body["messages"];
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[2]["content"], ECHO_XML);
    assert!(messages[2].get("tool_calls").is_none());
    assert_eq!(messages[3]["role"], "user");
    assert_eq!(messages[3]["content"], "[use_mcp_tool for 'echo'] Result:\nping");
    assert_eq!(session.calls.lock().await[0].1, json!({ "text": "ping" }));
}

#[tokio::test]
async fn xml_query_dispatches_directly() {
    let transport = ScriptedTransport::new(Vec::new());
    let mut chat = ChatSession::new(
        "sys",
        hub(StubSession::new(false)).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    );

    let narration = chat.process_query(&format!("  {ECHO_XML}  ")).await;

    assert_eq!(narration, "[invoking tool echo with args {\"text\":\"ping\"}]\nping");
    assert!(transport.requests().await.is_empty());
    assert_eq!(chat.transcript().len(), 1);
}

#[tokio::test]
async fn non_dispatchable_markup_falls_through_to_provider() {
    let transport = ScriptedTransport::new(vec![openai_text("That is HTML.")]);
    let mut chat = ChatSession::new(
        "sys",
        hub(StubSession::new(false)).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    );

    let narration = chat.process_query("<b>bold</b>").await;

    assert_eq!(narration, "That is HTML.");
    assert_eq!(transport.requests().await.len(), 1);
}

#[tokio::test]
async fn tool_failure_is_narrated_and_answered() {
    let transport = ScriptedTransport::new(vec![
        openai_tool_calls(&[("call_f", "x")]),
        openai_text("The tool failed."),
    ]);
    let mut chat = ChatSession::new(
        "sys",
        hub(StubSession::new(true)).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    );

    let narration = chat.process_query("try it").await;

    assert!(narration.contains("tool invocation failed"), "{narration}");
    assert!(narration.ends_with("The tool failed."));
    let tool_message = chat
        .transcript()
        .snapshot()
        .iter()
        .find(|m| m.role() == MessageRole::Tool)
        .cloned();
    assert!(matches!(
        tool_message,
        Some(ChatMessage::Tool { is_error: true, ref content, .. }) if content.contains("echo exploded")
    ));
    assert_eq!(transport.requests().await.len(), 2);
}

#[tokio::test]
async fn unknown_tool_still_gets_a_result_message() {
    let transport = ScriptedTransport::new(vec![
        json!({ "choices": [{ "message": { "tool_calls": [
            { "id": "call_u", "function": { "name": "missing", "arguments": "{}" } }
        ]}}]}),
        openai_text("No such tool."),
    ]);
    let mut chat = ChatSession::new(
        "sys",
        hub(StubSession::new(false)).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    );

    let narration = chat.process_query("call missing").await;

    assert!(narration.contains("no connected server provides \"missing\""), "{narration}");
    assert!(!chat.transcript().has_pending_calls());
}

#[tokio::test]
async fn backend_error_is_reported_and_session_continues() {
    let transport = ScriptedTransport::with_results(vec![
        Err(AdapterError::Api {
            provider: ProviderKind::OpenAi,
            status: 500,
            message: "upstream down".into(),
        }),
        Ok(openai_text("Recovered.")),
    ]);
    let mut chat = ChatSession::new(
        "sys",
        hub(StubSession::new(false)).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    );

    let first = chat.process_query("hello").await;
    assert!(first.contains("upstream down"), "{first}");

    let second = chat.process_query("hello again").await;
    assert_eq!(second, "Recovered.");
}

#[tokio::test]
async fn round_limit_drops_further_calls() {
    let transport = ScriptedTransport::new(vec![
        openai_tool_calls(&[("call_1", "a")]),
        json!({ "choices": [{ "message": {
            "content": "Need more.",
            "tool_calls": [{ "id": "call_2", "function": { "name": "echo", "arguments": "{}" } }]
        }}]}),
    ]);
    let session = StubSession::new(false);
    let mut chat = ChatSession::new(
        "sys",
        hub(session.clone()).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    );

    let narration = chat.process_query("go").await;

    assert!(narration.ends_with("Need more."));
    assert_eq!(transport.requests().await.len(), 2);
    assert_eq!(session.calls.lock().await.len(), 1);
    assert!(matches!(
        chat.transcript().last(),
        Some(ChatMessage::Assistant { tool_calls, .. }) if tool_calls.is_empty()
    ));
}

#[tokio::test]
async fn extra_rounds_are_allowed_when_configured() {
    let transport = ScriptedTransport::new(vec![
        openai_tool_calls(&[("call_1", "a")]),
        openai_tool_calls(&[("call_2", "b")]),
        openai_text("Done."),
    ]);
    let session = StubSession::new(false);
    let mut chat = ChatSession::new(
        "sys",
        hub(session.clone()).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    )
    .with_max_tool_rounds(2);

    let narration = chat.process_query("go").await;

    assert!(narration.ends_with("Done."));
    let requests = transport.requests().await;
    assert_eq!(requests.len(), 3);
    assert!(requests[1].body.get("tools").is_some());
    assert!(requests[2].body.get("tools").is_none());
    assert_eq!(session.calls.lock().await.len(), 2);
}

#[tokio::test]
async fn directive_routes_to_named_provider_on_shared_transcript() {
    let transport = ScriptedTransport::new(vec![
        json!({ "content": [{ "type": "text", "text": "from claude" }] }),
        openai_text("from gpt"),
    ]);
    let mut chat = ChatSession::new(
        "sys",
        hub(StubSession::new(false)).await,
        AdapterSet::new(vec![anthropic(&transport), openai(&transport, Some("sk-test"))]),
        ProviderKind::Anthropic,
    );

    assert_eq!(chat.process_query("hi").await, "from claude");
    assert_eq!(chat.process_query("/openai and you?").await, "from gpt");

    let requests = transport.requests().await;
    assert!(requests[0].url.ends_with("/v1/messages"));
    assert!(requests[1].url.ends_with("/chat/completions"));
    let messages = requests[1].body["messages"].as_array().cloned().unwrap_or_default();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2]["content"], "from claude");
    assert_eq!(messages[3]["content"], "and you?");
}

#[tokio::test]
async fn bare_directive_is_rejected_without_request() {
    let transport = ScriptedTransport::new(Vec::new());
    let mut chat = ChatSession::new(
        "sys",
        hub(StubSession::new(false)).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    );

    let narration = chat.process_query("/openai").await;
    assert!(narration.contains("/openai"));
    assert!(transport.requests().await.is_empty());
    assert_eq!(chat.transcript().len(), 1);
}

#[tokio::test]
async fn repeated_ids_in_one_batch_get_distinct_results() {
    let transport = ScriptedTransport::new(vec![
        openai_tool_calls(&[("call_0", "one"), ("call_0", "two")]),
        openai_text("done"),
    ]);
    let session = StubSession::new(false);
    let mut chat = ChatSession::new(
        "sys",
        hub(session.clone()).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    );

    let narration = chat.process_query("echo twice").await;

    assert!(narration.ends_with("done"), "{narration}");
    assert_eq!(session.calls.lock().await.len(), 2);
    assert!(!chat.transcript().has_pending_calls());

    let snapshot = chat.transcript().snapshot();
    let ids: Vec<&str> = snapshot[2].tool_calls().iter().map(|call| call.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], "call_0");
    assert_ne!(ids[0], ids[1]);

    let requests = transport.requests().await;
    assert_eq!(requests.len(), 2);
    let messages = requests[1].body["messages"].as_array().cloned().unwrap_or_default();
    let answered: Vec<_> = messages
        .iter()
        .filter(|m| m["role"] == "tool")
        .map(|m| m["tool_call_id"].clone())
        .collect();
    assert_eq!(answered, vec![json!(ids[0]), json!(ids[1])]);
}

#[tokio::test]
async fn id_reused_by_a_later_query_still_runs_the_tool() {
    let transport = ScriptedTransport::new(vec![
        openai_tool_calls(&[("call_0", "first")]),
        openai_text("one"),
        openai_tool_calls(&[("call_0", "second")]),
        openai_text("two"),
    ]);
    let session = StubSession::new(false);
    let mut chat = ChatSession::new(
        "sys",
        hub(session.clone()).await,
        AdapterSet::new(vec![openai(&transport, Some("sk-test"))]),
        ProviderKind::OpenAi,
    );

    assert!(chat.process_query("q1").await.ends_with("one"));
    let narration = chat.process_query("q2").await;

    assert_eq!(
        narration,
        "[invoking tool echo with args {\"text\":\"second\"}]\ntwo"
    );
    assert_eq!(session.calls.lock().await.len(), 2);
    assert!(!chat.transcript().has_pending_calls());
    assert_eq!(transport.requests().await.len(), 4);
}

#[tokio::test]
async fn gated_model_sees_alternating_roles_after_native_tool_traffic() {
    let transport = ScriptedTransport::new(vec![
        openai_tool_calls(&[("call_a", "one"), ("call_b", "two")]),
        openai_text("done"),
        openai_text("reasoned"),
    ]);
    let mut chat = ChatSession::new(
        "sys",
        hub(StubSession::new(false)).await,
        AdapterSet::new(vec![
            openai(&transport, Some("sk-test")),
            deepseek(&transport, "deepseek-reasoner"),
        ]),
        ProviderKind::OpenAi,
    );

    chat.process_query("q1").await;
    assert_eq!(chat.process_query("/deepseek q2").await, "reasoned");

    let requests = transport.requests().await;
    assert_eq!(requests.len(), 3);
    let messages = requests[2].body["messages"].as_array().cloned().unwrap_or_default();
    let roles: Vec<&str> = messages.iter().filter_map(|m| m["role"].as_str()).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(
        messages[1]["content"],
        "q1\n\n[use_mcp_tool for 'echo'] Result:\none\n\n[use_mcp_tool for 'echo'] Result:\ntwo"
    );
    assert_eq!(messages[2]["content"], "done");
    assert_eq!(messages[3]["content"], "q2");
    assert!(messages.iter().all(|m| m.get("tool_calls").is_none()));
}
