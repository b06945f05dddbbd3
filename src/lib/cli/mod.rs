use clap::Parser;
use std::path::PathBuf;

use crate::infrastructure::provider::ProviderKind;

#[derive(Parser, Debug)]
#[command(
    name = "relay-mcp",
    version,
    about = "Chat client that lets Anthropic, OpenAI and DeepSeek models call MCP tools"
)]
pub struct Cli {
    /// Client settings file (defaults to config/client.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// MCP server list, overriding `servers_file`
    #[arg(long)]
    pub servers: Option<PathBuf>,
    /// Provider used for queries without a directive prefix
    #[arg(long, value_parser = parse_provider)]
    pub provider: Option<ProviderKind>,
    /// File whose contents replace the system prompt
    #[arg(long)]
    pub system_file: Option<PathBuf>,
    /// Tool-call rounds allowed per query
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_tool_rounds: Option<u32>,
    /// Log progress at info level on stderr
    #[arg(long, short)]
    pub verbose: bool,
}

fn parse_provider(value: &str) -> Result<ProviderKind, String> {
    ProviderKind::from_id(value).ok_or_else(|| {
        let known: Vec<&str> = ProviderKind::all().iter().map(|kind| kind.id()).collect();
        format!("unknown provider '{value}', expected one of: {}", known.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "relay-mcp",
            "--servers",
            "servers.json",
            "--provider",
            "deepseek",
            "--max-tool-rounds",
            "3",
            "-v",
        ])
        .expect("cli");
        assert_eq!(cli.servers, Some(PathBuf::from("servers.json")));
        assert_eq!(cli.provider, Some(ProviderKind::DeepSeek));
        assert_eq!(cli.max_tool_rounds, Some(3));
        assert!(cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn rejects_unknown_provider_and_zero_rounds() {
        assert!(Cli::try_parse_from(["relay-mcp", "--provider", "gemini"]).is_err());
        assert!(Cli::try_parse_from(["relay-mcp", "--max-tool-rounds", "0"]).is_err());
    }
}
