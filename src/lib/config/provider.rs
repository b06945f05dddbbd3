//! # Provider Settings
//!
//! Per-backend settings. Every supported backend has built-in defaults, so a
//! `[[providers]]` entry only needs the fields it overrides.
//!
//! ```toml
//! [[providers]]
//! id = "deepseek"
//! model = "deepseek-reasoner"
//! function_calling = false
//! ```

use crate::infrastructure::provider::ProviderKind;
use serde::Deserialize;

/// Resolved settings for one provider backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    /// Base URL, without the API path.
    pub endpoint: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Environment variable that overrides `endpoint` when set.
    pub endpoint_env: Option<String>,
    pub max_tokens: u32,
    /// Explicit function-calling switch; `None` means infer from the model id.
    pub function_calling: Option<bool>,
}

impl ProviderSettings {
    /// Built-in settings for `kind`.
    pub fn defaults_for(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Anthropic => Self {
                kind,
                model: "claude-3-5-sonnet-20240620".into(),
                endpoint: "https://api.anthropic.com".into(),
                api_key_env: "ANTHROPIC_API_KEY".into(),
                endpoint_env: None,
                max_tokens: 1000,
                function_calling: None,
            },
            ProviderKind::OpenAi => Self {
                kind,
                model: "gpt-4o".into(),
                endpoint: "https://api.openai.com/v1".into(),
                api_key_env: "OPENAI_API_KEY".into(),
                endpoint_env: Some("OPENAI_BASE_URL".into()),
                max_tokens: 1000,
                function_calling: None,
            },
            ProviderKind::DeepSeek => Self {
                kind,
                model: "deepseek-chat".into(),
                endpoint: "https://api.deepseek.com".into(),
                api_key_env: "DEEPSEEK_API_KEY".into(),
                endpoint_env: Some("DEEPSEEK_BASE_URL".into()),
                max_tokens: 1000,
                function_calling: None,
            },
        }
    }

    /// Defaults for every supported provider, in directive order.
    pub fn all_defaults() -> Vec<Self> {
        ProviderKind::all()
            .iter()
            .copied()
            .map(Self::defaults_for)
            .collect()
    }

    pub(super) fn apply(&mut self, raw: RawProviderConfig) {
        if let Some(model) = raw.model {
            self.model = model;
        }
        if let Some(endpoint) = raw.endpoint {
            self.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(api_key_env) = raw.api_key_env {
            self.api_key_env = api_key_env;
        }
        if raw.endpoint_env.is_some() {
            self.endpoint_env = raw.endpoint_env;
        }
        if let Some(max_tokens) = raw.max_tokens {
            self.max_tokens = max_tokens;
        }
        if raw.function_calling.is_some() {
            self.function_calling = raw.function_calling;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct RawProviderConfig {
    pub id: ProviderKind,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub api_key_env: Option<String>,
    pub endpoint_env: Option<String>,
    pub max_tokens: Option<u32>,
    pub function_calling: Option<bool>,
}
