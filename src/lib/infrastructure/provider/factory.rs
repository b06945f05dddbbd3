//! Adapter factory - builds one adapter per configured provider

use super::anthropic::AnthropicAdapter;
use super::openai::OpenAiCompatibleAdapter;
use super::transport::ChatTransport;
use super::{ProviderAdapter, ProviderKind};
use crate::config::{AppConfig, ProviderSettings};
use std::env;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolve API key from environment variable
pub fn resolve_api_key(provider: ProviderKind, env_var: &str) -> Option<String> {
    let name = env_var.trim();
    if name.is_empty() {
        return None;
    }
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        Ok(_) => {
            warn!(%provider, env_var = name, "API key environment variable is empty");
            None
        }
        Err(err) => {
            warn!(
                %provider,
                env_var = name,
                %err,
                "API key environment variable is not set"
            );
            None
        }
    }
}

/// Endpoint from the override variable when it is set, else the configured one.
fn resolve_endpoint(settings: &ProviderSettings) -> String {
    settings
        .endpoint_env
        .as_deref()
        .and_then(|name| env::var(name).ok())
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .inspect(|value| debug!(provider = %settings.kind, endpoint = %value, "Using endpoint override"))
        .unwrap_or_else(|| settings.endpoint.clone())
}

/// Adapters keyed by provider, in configuration order.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl AdapterSet {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self { adapters }
    }

    /// Creates an adapter for every configured provider. Providers without a
    /// credential are still created and fail when first used.
    pub fn from_config(config: &AppConfig, transport: Arc<dyn ChatTransport>) -> Self {
        let adapters = config
            .providers
            .iter()
            .map(|settings| Self::create(settings, transport.clone()))
            .collect();
        Self { adapters }
    }

    pub fn create(settings: &ProviderSettings, transport: Arc<dyn ChatTransport>) -> Arc<dyn ProviderAdapter> {
        let api_key = resolve_api_key(settings.kind, &settings.api_key_env);
        let mut settings = settings.clone();
        settings.endpoint = resolve_endpoint(&settings);

        let adapter: Arc<dyn ProviderAdapter> = match settings.kind {
            ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(&settings, api_key, transport)),
            ProviderKind::OpenAi | ProviderKind::DeepSeek => {
                Arc::new(OpenAiCompatibleAdapter::new(&settings, api_key, transport))
            }
        };
        info!(
            provider = %settings.kind,
            model = adapter.model(),
            function_calling = adapter.supports_tools(),
            configured = adapter.ensure_configured().is_ok(),
            "Provider adapter ready"
        );
        adapter
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.kind() == kind)
            .cloned()
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.adapters.iter().map(|adapter| adapter.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
