//! Provider-agnostic types for multi-backend generation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ProviderError;

/// Provider-agnostic chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Message role. System instructions travel separately from the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Requested model for a call, honored only by the adapter serving `provider`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPreference {
    pub provider: String,
    pub model_id: String,
}

/// Per-call generation knobs. `None` means the backend or route default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default)]
    pub json_mode: Option<bool>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub model: Option<ModelPreference>,
}

impl GenerationOptions {
    pub fn json_mode(&self) -> bool {
        self.json_mode.unwrap_or(false)
    }

    /// The preferred model id if it targets the given backend
    pub fn preferred_model_for(&self, provider: &str) -> Option<&str> {
        self.model
            .as_ref()
            .filter(|p| p.provider == provider)
            .map(|p| p.model_id.as_str())
    }
}

/// Token usage reported by a backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Uniform result of a generation call.
///
/// `provider_name` and `model_id` always name the backend and model that
/// actually produced `content`, even when a fallback served the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    pub provider_name: String,
    pub model_id: String,
    pub usage: Option<Usage>,
    /// Backend stopped at its output-length cap
    #[serde(default)]
    pub truncated: bool,
    /// Why a model or backend other than the first choice served this call
    #[serde(default)]
    pub fallback_reason: Option<String>,
}

impl GenerationResult {
    pub fn fallback_used(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Trait that every backend adapter implements
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend name (e.g. "anthropic", "openai")
    fn name(&self) -> &str;

    /// True iff a credential was resolvable at construction
    fn is_available(&self) -> bool;

    /// Send a conversation with a system prompt
    async fn chat(
        &self,
        messages: &[Message],
        system: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, ProviderError>;
}
