//! Backend adapter: credential gate plus primary → secondary model fallback
//!
//! The literal network call is delegated to a [`ChatTransport`]; the adapter
//! owns everything around it: availability, model choice, the single retry
//! on a transient error, and truncation reporting.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::anthropic::AnthropicTransport;
use super::error::ProviderError;
use super::google::GoogleTransport;
use super::openai::OpenAiTransport;
use super::types::{GenerationOptions, GenerationResult, LlmProvider, Message, Usage};
use crate::config::ProviderOverride;
use crate::events::{EventSink, NoopEventSink, RoutingEvent};

/// One call as handed to a wire transport
pub struct TransportRequest<'a> {
    pub api_key: &'a str,
    pub model: &'a str,
    pub messages: &'a [Message],
    pub system: &'a str,
    pub options: &'a GenerationOptions,
}

impl std::fmt::Debug for TransportRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRequest")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("messages", &self.messages.len())
            .field("options", &self.options)
            .finish()
    }
}

/// What a wire transport hands back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    pub text: String,
    pub usage: Option<Usage>,
    /// Output stopped at the length cap
    pub truncated: bool,
}

/// Performs the remote call for one backend's protocol
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(
        &self,
        provider: &str,
        request: &TransportRequest<'_>,
    ) -> Result<TransportResponse, ProviderError>;
}

/// Backends with a built-in wire transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Google,
    Groq,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Anthropic,
        ProviderKind::OpenAi,
        ProviderKind::Google,
        ProviderKind::Groq,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "openai" => Some(Self::OpenAi),
            "google" | "gemini" => Some(Self::Google),
            "groq" => Some(Self::Groq),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::Groq => "groq",
        }
    }

    /// Default (primary, secondary) model ids
    pub fn default_models(&self) -> (&'static str, &'static str) {
        match self {
            Self::Anthropic => ("claude-sonnet-4-20250514", "claude-3-5-haiku-latest"),
            Self::OpenAi => ("gpt-4o", "gpt-4o-mini"),
            Self::Google => ("gemini-1.5-pro", "gemini-2.0-flash"),
            Self::Groq => ("llama-3.3-70b-versatile", "llama-3.1-8b-instant"),
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta",
            Self::Groq => "https://api.groq.com/openai/v1",
        }
    }

    /// Environment variables a host may read the credential from, in order
    pub fn credential_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Google => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
            Self::Groq => &["GROQ_API_KEY"],
        }
    }

    /// Build the wire transport for this backend
    pub fn transport(&self, base_url: Option<&str>) -> Arc<dyn ChatTransport> {
        let base_url = base_url.unwrap_or(self.default_base_url()).to_string();
        match self {
            Self::Anthropic => Arc::new(AnthropicTransport::new(base_url)),
            Self::OpenAi | Self::Groq => Arc::new(OpenAiTransport::new(base_url)),
            Self::Google => Arc::new(GoogleTransport::new(base_url)),
        }
    }
}

/// Adapter for one backend
pub struct BackendAdapter {
    name: String,
    api_key: Option<String>,
    primary_model: String,
    secondary_model: Option<String>,
    transport: Arc<dyn ChatTransport>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for BackendAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendAdapter")
            .field("name", &self.name)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("primary_model", &self.primary_model)
            .field("secondary_model", &self.secondary_model)
            .finish()
    }
}

impl BackendAdapter {
    /// Create an adapter. An empty or missing key leaves it unavailable.
    pub fn new(
        name: impl Into<String>,
        api_key: Option<String>,
        primary_model: impl Into<String>,
        secondary_model: Option<String>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            primary_model: primary_model.into(),
            secondary_model,
            transport,
            events: Arc::new(NoopEventSink),
        }
    }

    /// Adapter for a built-in backend, applying any configured overrides
    pub fn for_kind(kind: ProviderKind, api_key: Option<String>, overrides: &ProviderOverride) -> Self {
        let (primary, secondary) = kind.default_models();
        let primary = overrides.primary_model.as_deref().unwrap_or(primary);
        let secondary = overrides
            .secondary_model
            .clone()
            .unwrap_or_else(|| secondary.to_string());
        Self::new(
            kind.name(),
            api_key,
            primary,
            Some(secondary),
            kind.transport(overrides.base_url.as_deref()),
        )
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn primary_model(&self) -> &str {
        &self.primary_model
    }

    pub fn secondary_model(&self) -> Option<&str> {
        self.secondary_model.as_deref()
    }

    async fn call(
        &self,
        api_key: &str,
        model: &str,
        messages: &[Message],
        system: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, ProviderError> {
        let request = TransportRequest {
            api_key,
            model,
            messages,
            system,
            options,
        };
        debug!(provider = %self.name, model = model, "Sending chat request");
        let response = self.transport.send(&self.name, &request).await?;

        if response.truncated {
            warn!(provider = %self.name, model = model, "Response hit output token cap");
            self.events.emit(&RoutingEvent::ResponseTruncated {
                provider: self.name.clone(),
                model: model.to_string(),
            });
        }

        Ok(GenerationResult {
            content: response.text,
            provider_name: self.name.clone(),
            model_id: model.to_string(),
            usage: response.usage,
            truncated: response.truncated,
            fallback_reason: None,
        })
    }
}

#[async_trait]
impl LlmProvider for BackendAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn chat(
        &self,
        messages: &[Message],
        system: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, ProviderError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ProviderError::NotConfigured {
                provider: self.name.clone(),
            });
        };

        let primary = options
            .preferred_model_for(&self.name)
            .unwrap_or(self.primary_model.as_str());

        let err = match self.call(api_key, primary, messages, system, options).await {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };

        let secondary = match self.secondary_model.as_deref() {
            Some(secondary) if err.is_retryable() && secondary != primary => secondary,
            _ => return Err(err),
        };

        warn!(
            provider = %self.name,
            from = primary,
            to = secondary,
            "Primary model failed ({}), retrying on secondary",
            err.kind()
        );
        self.events.emit(&RoutingEvent::ModelFallback {
            provider: self.name.clone(),
            from_model: primary.to_string(),
            to_model: secondary.to_string(),
            reason: err.to_string(),
        });

        let mut result = self
            .call(api_key, secondary, messages, system, options)
            .await?;
        result.fallback_reason = Some(format!(
            "{} model {} failed ({}); served by {}",
            self.name,
            primary,
            err.kind(),
            secondary
        ));
        Ok(result)
    }
}
