//! HTTP transport shared by every adapter.

use super::ProviderKind;
use super::error::AdapterError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// A JSON POST to a provider endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub provider: ProviderKind,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpRequest {
    pub fn new(provider: ProviderKind, url: String, body: Value) -> Self {
        Self {
            provider,
            url,
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_json(&self, request: HttpRequest) -> Result<Value, AdapterError>;
}

/// Build URL from endpoint and path
pub fn build_url(endpoint: &str, path: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

#[async_trait]
impl ChatTransport for ReqwestTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<Value, AdapterError> {
        let provider = request.provider;
        let mut builder = self
            .http
            .post(&request.url)
            .header("Content-Type", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .json(&request.body)
            .send()
            .await
            .map_err(|e| AdapterError::network(provider, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%provider, status = status.as_u16(), "Provider returned error status");
            return Err(AdapterError::Api {
                provider,
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::network(provider, e))
    }
}

/// Pulls `error.message` out of a provider error body, falling back to the
/// raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
