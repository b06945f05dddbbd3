pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{orchestrator, stdio, tooling};
pub use cli::Cli;
pub use config::{AppConfig, ProviderSettings, ServerConfig};
pub use domain::types;
pub use infrastructure::provider;

use application::orchestrator::ChatSession;
use application::prompt::default_system_prompt;
use application::tooling::ToolHub;
use infrastructure::provider::{AdapterSet, ReqwestTransport};
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    init_tracing(cli.verbose);
    info!("Starting relay-mcp");
    debug!(
        config = ?cli.config,
        servers = ?cli.servers,
        provider = ?cli.provider,
        "CLI arguments parsed"
    );

    let mut app_config = AppConfig::load(cli.config.as_deref())?;
    apply_cli_overrides(&cli, &mut app_config)?;

    let servers = config::load_servers(&app_config.servers_file)?;
    let hub = ToolHub::connect(&servers).await?;
    info!(
        servers = hub.server_names().len(),
        tools = hub.registry().len(),
        "MCP servers connected"
    );

    let system_prompt = match app_config.resolve_system_prompt() {
        Ok(Some(prompt)) if !prompt.trim().is_empty() => prompt,
        Ok(_) => default_system_prompt(hub.registry()),
        Err(err) => {
            hub.close_all().await;
            return Err(err.into());
        }
    };

    let adapters = AdapterSet::from_config(&app_config, Arc::new(ReqwestTransport::new()));
    let mut session = ChatSession::new(system_prompt, hub, adapters, app_config.default_provider)
        .with_max_tool_rounds(app_config.max_tool_rounds);

    info!(
        provider = %session.default_provider(),
        max_tool_rounds = app_config.max_tool_rounds,
        "Launching STDIO interactive chat interface"
    );
    let outcome = stdio::run(&mut session).await;
    session.shutdown().await;
    outcome?;

    info!("Client execution finished");
    Ok(())
}

fn apply_cli_overrides(cli: &Cli, config: &mut AppConfig) -> Result<(), config::ConfigError> {
    if let Some(provider) = cli.provider {
        config.default_provider = provider;
    }
    if let Some(servers) = &cli.servers {
        config.servers_file = servers.clone();
    }
    if let Some(path) = &cli.system_file {
        config.system_prompt_file = Some(path.clone());
    }
    if let Some(rounds) = cli.max_tool_rounds {
        config.set_max_tool_rounds(rounds as usize)?;
    }
    Ok(())
}

/// Logs go to stderr so stdout carries only the conversation.
fn init_tracing(verbose: bool) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let default = if verbose { "info" } else { "warn" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
