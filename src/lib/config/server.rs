use super::error::ConfigError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One MCP server entry from the server list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: Option<PathBuf>,
    /// Tools the server list marks as auto-approved. Carried for display only.
    pub auto_approve: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawServer {
    #[serde(default)]
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    cwd: Option<String>,
    #[serde(default)]
    disabled: bool,
    #[serde(default, rename = "autoApprove")]
    auto_approve: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawServerList {
    #[serde(default, rename = "mcpServers")]
    mcp_servers: Map<String, Value>,
}

fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

impl ServerConfig {
    fn from_raw(name: String, raw: RawServer) -> Self {
        Self {
            name,
            command: PathBuf::from(expand(&raw.command)),
            args: raw.args.iter().map(|arg| expand(arg)).collect(),
            env: raw
                .env
                .into_iter()
                .map(|(key, value)| {
                    let value = expand(&value);
                    (key, value)
                })
                .collect(),
            workdir: raw.cwd.map(|dir| PathBuf::from(expand(&dir))),
            auto_approve: raw.auto_approve,
        }
    }
}

/// Parses a server list document. Disabled entries are skipped; the order of
/// the remaining entries follows the document.
pub fn parse_servers(path: &Path, content: &str) -> Result<Vec<ServerConfig>, ConfigError> {
    let invalid = |source| ConfigError::InvalidServerList {
        path: path.to_path_buf(),
        source,
    };
    let list: RawServerList = serde_json::from_str(content).map_err(invalid)?;

    let mut servers = Vec::with_capacity(list.mcp_servers.len());
    for (name, value) in list.mcp_servers {
        let raw: RawServer = serde_json::from_value(value).map_err(invalid)?;
        if raw.disabled {
            debug!(server = %name, "Skipping disabled MCP server");
            continue;
        }
        if raw.command.trim().is_empty() {
            return Err(ConfigError::MissingCommand { server: name });
        }
        servers.push(ServerConfig::from_raw(name, raw));
    }
    Ok(servers)
}

/// Reads the MCP server list. A missing file is fatal.
pub fn load_servers(path: &Path) -> Result<Vec<ServerConfig>, ConfigError> {
    debug!(path = %path.display(), "Reading MCP server list");
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let servers = parse_servers(path, &content)?;
    info!(count = servers.len(), "Loaded MCP server list");
    Ok(servers)
}
