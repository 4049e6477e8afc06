//! Classified provider errors
//!
//! The retry decision is a pure function of the variant: only `RateLimited`
//! and `Unavailable` trigger an adapter's secondary-model attempt.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// No credential was supplied for this backend
    #[error("provider '{provider}' is not configured (missing credential)")]
    NotConfigured { provider: String },

    /// Rate limit or backend-reported quota exhaustion
    #[error("provider '{provider}' rate limited: {message}")]
    RateLimited { provider: String, message: String },

    /// Backend temporarily unavailable or overloaded
    #[error("provider '{provider}' unavailable: {message}")]
    Unavailable { provider: String, message: String },

    /// Backend answered with an unexpected payload shape
    #[error("provider '{provider}' returned a malformed response: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("provider '{provider}' failed: {message}")]
    Other { provider: String, message: String },

    #[error("no providers available")]
    NoProvidersAvailable,

    /// Every backend failed; carries the last backend's error
    #[error("all {attempts} providers failed; last error: {last}")]
    AllProvidersFailed {
        attempts: usize,
        last: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Whether the error is transient and worth a secondary-model attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Unavailable { .. })
    }

    /// Backend that raised the error, if any
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::NotConfigured { provider }
            | Self::RateLimited { provider, .. }
            | Self::Unavailable { provider, .. }
            | Self::MalformedResponse { provider, .. }
            | Self::Other { provider, .. } => Some(provider),
            Self::NoProvidersAvailable => None,
            Self::AllProvidersFailed { last, .. } => last.provider(),
        }
    }

    /// The last backend error when every backend failed, otherwise `self`
    pub fn last_error(&self) -> &ProviderError {
        match self {
            Self::AllProvidersFailed { last, .. } => last.last_error(),
            other => other,
        }
    }

    /// Short machine-friendly kind label used in events and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured { .. } => "not_configured",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable { .. } => "unavailable",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Other { .. } => "other",
            Self::NoProvidersAvailable => "no_providers_available",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
        }
    }
}
