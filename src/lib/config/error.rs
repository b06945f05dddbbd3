use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse MCP server list {path:?}: {source}")]
    InvalidServerList {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("MCP server '{server}' is missing a command")]
    MissingCommand { server: String },

    #[error("max_tool_rounds must be at least 1")]
    InvalidToolRounds,
}
