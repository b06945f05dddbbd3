use super::error::ConfigError;
use super::provider::ProviderSettings;
use super::SERVERS_PATH;
use crate::infrastructure::provider::ProviderKind;
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration loaded from client.toml
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub default_provider: ProviderKind,
    /// Tool-call rounds allowed per query.
    pub max_tool_rounds: usize,
    pub system_prompt: Option<String>,
    pub system_prompt_file: Option<PathBuf>,
    pub servers_file: PathBuf,
    pub providers: Vec<ProviderSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderKind::Anthropic,
            max_tool_rounds: 1,
            system_prompt: None,
            system_prompt_file: None,
            servers_file: PathBuf::from(SERVERS_PATH),
            providers: ProviderSettings::all_defaults(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderSettings> {
        self.providers.iter().find(|provider| provider.kind == kind)
    }

    pub fn set_max_tool_rounds(&mut self, rounds: usize) -> Result<(), ConfigError> {
        if rounds == 0 {
            return Err(ConfigError::InvalidToolRounds);
        }
        self.max_tool_rounds = rounds;
        Ok(())
    }

    /// Prompt text configured inline or through `system_prompt_file`. The file
    /// wins when both are set.
    pub fn resolve_system_prompt(&self) -> Result<Option<String>, ConfigError> {
        if let Some(path) = &self.system_prompt_file {
            let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            return Ok(Some(text));
        }
        Ok(self.system_prompt.clone())
    }
}
