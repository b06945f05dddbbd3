pub mod app;
pub mod error;
pub mod loader;
pub mod provider;
pub mod server;

/// Default client settings path - can be overridden via CLI argument
pub const CONFIG_PATH: &str = "config/client.toml";
/// Default MCP server list path
pub const SERVERS_PATH: &str = "mcp_settings.json";

pub use app::AppConfig;
pub use error::ConfigError;
pub use loader::ensure_env_loaded;
pub use provider::ProviderSettings;
pub use server::{ServerConfig, load_servers, parse_servers};
pub use loader::load_config;
