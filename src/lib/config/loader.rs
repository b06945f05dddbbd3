use super::CONFIG_PATH;
use super::app::AppConfig;
use super::error::ConfigError;
use super::provider::{ProviderSettings, RawProviderConfig};
use crate::infrastructure::provider::ProviderKind;
use dotenvy::from_filename;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{debug, info};

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
pub(super) struct RawConfig {
    pub default_provider: Option<ProviderKind>,
    pub max_tool_rounds: Option<usize>,
    pub system_prompt: Option<String>,
    pub system_prompt_file: Option<String>,
    pub servers_file: Option<String>,
    #[serde(default)]
    pub providers: Vec<RawProviderConfig>,
}

/// Loads `.env` and `config/.env` into the process environment, once.
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename(".env");
        let _ = from_filename("config/.env");
    });
}

/// Load configuration from a file path. Without an explicit path a missing
/// default file yields the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    match path {
        Some(path) => read_config(path),
        None => {
            let default_path = Path::new(CONFIG_PATH);
            match read_config(default_path) {
                Err(ConfigError::NotFound { .. }) => {
                    info!(path = CONFIG_PATH, "No client configuration found, using defaults");
                    Ok(AppConfig::default())
                }
                other => other,
            }
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading client configuration file");

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

    parse_config(path, &content)
}

pub(super) fn parse_config(path: &Path, content: &str) -> Result<AppConfig, ConfigError> {
    let parsed: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_and_build(parsed)
}

fn expand_path(value: &str) -> PathBuf {
    PathBuf::from(
        shellexpand::full(value)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| value.to_string()),
    )
}

fn validate_and_build(parsed: RawConfig) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::default();

    if let Some(provider) = parsed.default_provider {
        config.default_provider = provider;
    }
    if let Some(rounds) = parsed.max_tool_rounds {
        config.set_max_tool_rounds(rounds)?;
    }
    config.system_prompt = parsed.system_prompt;
    config.system_prompt_file = parsed.system_prompt_file.as_deref().map(expand_path);
    if let Some(servers_file) = parsed.servers_file.as_deref() {
        config.servers_file = expand_path(servers_file);
    }

    for raw in parsed.providers {
        match config.providers.iter_mut().find(|p| p.kind == raw.id) {
            Some(settings) => settings.apply(raw),
            None => {
                let mut settings = ProviderSettings::defaults_for(raw.id);
                settings.apply(raw);
                config.providers.push(settings);
            }
        }
    }

    Ok(config)
}
