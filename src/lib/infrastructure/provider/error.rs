use super::ProviderKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("provider '{provider}' requires an API key in ${variable}")]
    MissingCredential {
        provider: ProviderKind,
        variable: String,
    },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' returned HTTP {status}: {message}")]
    Api {
        provider: ProviderKind,
        status: u16,
        message: String,
    },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: ProviderKind, reason: String },
}

impl AdapterError {
    pub fn missing_credential(provider: ProviderKind, variable: impl Into<String>) -> Self {
        Self::MissingCredential {
            provider,
            variable: variable.into(),
        }
    }

    pub fn network(provider: ProviderKind, source: reqwest::Error) -> Self {
        Self::Network { provider, source }
    }

    pub fn invalid_response(provider: ProviderKind, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider,
            reason: reason.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, AdapterError::MissingCredential { .. })
    }

    pub fn user_message(&self) -> String {
        match self {
            AdapterError::MissingCredential { provider, variable } => {
                format!("Provider '{provider}' is not configured: set {variable} to use it.")
            }
            AdapterError::Network { provider, source } => {
                if source.is_connect() {
                    format!("Could not connect to provider '{provider}'.")
                } else if source.is_timeout() {
                    format!("Request to '{provider}' timed out.")
                } else {
                    format!("Network error talking to '{provider}'.")
                }
            }
            AdapterError::Api {
                provider,
                status,
                message,
            } => format!("Provider '{provider}' rejected the request ({status}): {message}"),
            AdapterError::InvalidResponse { provider, reason } => {
                format!("Provider '{provider}' sent a response I could not read: {reason}")
            }
        }
    }
}
