use crate::application::orchestrator::{ChatSession, is_quit_command};
use thiserror::Error;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interactive loop on the process stdin/stdout.
pub async fn run(session: &mut ChatSession) -> Result<(), StdioError> {
    let mut stdout = io::stdout();
    let stdin = BufReader::new(io::stdin());
    run_with(session, stdin, &mut stdout).await
}

/// Reads queries line by line until `quit` or end of input, writing one
/// narration per query.
pub async fn run_with<R, W>(session: &mut ChatSession, input: R, output: &mut W) -> Result<(), StdioError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    print_banner(session, output).await?;

    loop {
        prompt(output).await?;
        let line = match lines.next_line().await? {
            Some(line) => line,
            None => {
                debug!("STDIN closed");
                write_line(output, "").await?;
                break;
            }
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if is_quit_command(query) {
            info!("Quit requested");
            break;
        }

        let narration = session.process_query(query).await;
        write_line(output, &format!("\n{narration}")).await?;
    }

    output.flush().await?;
    Ok(())
}

async fn print_banner<W: AsyncWrite + Unpin>(session: &ChatSession, output: &mut W) -> io::Result<()> {
    let registry = session.hub().registry();
    for server in session.hub().server_names() {
        let tools: Vec<&str> = registry
            .iter()
            .filter(|entry| &entry.server == server)
            .map(|entry| entry.descriptor.name.as_str())
            .collect();
        write_line(
            output,
            &format!("Connected to server {server} with tools: {}", tools.join(", ")),
        )
        .await?;
    }
    write_line(output, "\nMCP Client Started!").await?;
    write_line(output, "Type your queries or 'quit' to exit.").await
}

async fn prompt<W: AsyncWrite + Unpin>(output: &mut W) -> io::Result<()> {
    output.write_all(b"\nQuery: ").await?;
    output.flush().await
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> io::Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooling::ToolHub;
    use crate::config::ProviderSettings;
    use crate::infrastructure::provider::{
        AdapterError, AdapterSet, ChatTransport, HttpRequest, OpenAiCompatibleAdapter, ProviderAdapter,
        ProviderKind,
    };
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct EchoTransport {
        seen: Arc<Mutex<Vec<HttpRequest>>>,
    }

    #[async_trait]
    impl ChatTransport for EchoTransport {
        async fn post_json(&self, request: HttpRequest) -> Result<Value, AdapterError> {
            let last = request.body["messages"]
                .as_array()
                .and_then(|messages| messages.last())
                .and_then(|message| message["content"].as_str())
                .unwrap_or_default()
                .to_string();
            self.seen.lock().await.push(request);
            Ok(json!({ "choices": [{ "message": { "content": format!("echo: {last}") } }] }))
        }
    }

    async fn session(transport: &EchoTransport) -> ChatSession {
        let hub = ToolHub::from_sessions(Vec::new()).await.expect("hub");
        let adapter = OpenAiCompatibleAdapter::new(
            &ProviderSettings::defaults_for(ProviderKind::OpenAi),
            Some("sk-test".into()),
            Arc::new(transport.clone()),
        );
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![Arc::new(adapter)];
        ChatSession::new("sys", hub, AdapterSet::new(adapters), ProviderKind::OpenAi)
    }

    #[tokio::test]
    async fn answers_each_query_and_stops_at_quit() {
        let transport = EchoTransport::default();
        let mut chat = session(&transport).await;
        let input: &[u8] = b"hello\n\n   \nQuit\nnever sent\n";
        let mut output = Vec::new();

        run_with(&mut chat, input, &mut output).await.expect("loop");

        let text = String::from_utf8(output).expect("utf8");
        assert!(text.contains("MCP Client Started!"));
        assert!(text.contains("Type your queries or 'quit' to exit."));
        assert!(text.contains("Query: "));
        assert!(text.contains("echo: hello"));
        assert!(!text.contains("never sent"));
        assert_eq!(transport.seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn end_of_input_exits_cleanly() {
        let transport = EchoTransport::default();
        let mut chat = session(&transport).await;
        let input: &[u8] = b"first";
        let mut output = Vec::new();

        run_with(&mut chat, input, &mut output).await.expect("loop");

        let text = String::from_utf8(output).expect("utf8");
        assert!(text.contains("echo: first"));
        assert_eq!(chat.transcript().len(), 3);
    }
}
