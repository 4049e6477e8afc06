//! Provider manager: ordered cross-backend fallback
//!
//! Holds the adapters that had credentials at construction, in configured
//! order, and walks them until one answers. Callers may reorder the walk by
//! naming preferred models. First success wins; adapters are
//! never raced.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::adapter::{BackendAdapter, ProviderKind};
use super::error::ProviderError;
use super::types::{GenerationOptions, GenerationResult, LlmProvider, Message, ModelPreference};
use crate::config::ProvidersConfig;
use crate::events::{EventSink, NoopEventSink, RoutingEvent};

/// Backend credentials keyed by backend name, injected by the host
#[derive(Clone, Default)]
pub struct Credentials {
    keys: HashMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.keys.keys().collect();
        names.sort();
        f.debug_struct("Credentials")
            .field("providers", &names)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.set(provider, key);
        self
    }

    pub fn set(&mut self, provider: impl Into<String>, key: impl Into<String>) {
        self.keys.insert(provider.into(), key.into());
    }

    pub fn get(&self, provider: &str) -> Option<&str> {
        self.keys.get(provider).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub struct ProviderManager {
    providers: Vec<Arc<dyn LlmProvider>>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManager")
            .field("providers", &self.available_providers())
            .finish()
    }
}

impl ProviderManager {
    /// Build one adapter per configured backend name, keeping only those
    /// with a credential. Unknown or repeated names are skipped.
    pub fn new(config: &ProvidersConfig, credentials: &Credentials, events: Arc<dyn EventSink>) -> Self {
        let mut adapters: Vec<Arc<dyn LlmProvider>> = Vec::new();
        let mut seen = Vec::new();

        for name in &config.order {
            let Some(kind) = ProviderKind::from_name(name) else {
                warn!("Unknown provider '{}' in configuration, skipping", name);
                continue;
            };
            if seen.contains(&kind) {
                warn!("Provider '{}' listed twice, keeping first position", kind.name());
                continue;
            }
            seen.push(kind);

            let overrides = config
                .overrides
                .get(kind.name())
                .or_else(|| config.overrides.get(name.as_str()))
                .cloned()
                .unwrap_or_default();
            let adapter = BackendAdapter::for_kind(
                kind,
                credentials.get(kind.name()).map(str::to_string),
                &overrides,
            )
            .with_events(events.clone());
            adapters.push(Arc::new(adapter));
        }

        Self::from_providers(adapters, events)
    }

    /// Wrap pre-built providers, dropping unavailable ones but keeping order
    pub fn from_providers(providers: Vec<Arc<dyn LlmProvider>>, events: Arc<dyn EventSink>) -> Self {
        let providers: Vec<Arc<dyn LlmProvider>> = providers
            .into_iter()
            .filter(|p| {
                let available = p.is_available();
                if !available {
                    debug!("Provider '{}' has no credential, excluding", p.name());
                }
                available
            })
            .collect();

        info!(
            "Provider manager ready with {} backend(s): {:?}",
            providers.len(),
            providers.iter().map(|p| p.name()).collect::<Vec<_>>()
        );

        Self { providers, events }
    }

    /// Manager with no backends and no event sink
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
            events: Arc::new(NoopEventSink),
        }
    }

    pub fn available_providers(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Look up an available backend by name
    pub fn provider(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// Run the call against each backend in configured order until one succeeds.
    ///
    /// Fails with `NoProvidersAvailable` when nothing is configured, or with
    /// `AllProvidersFailed` carrying the last backend's error.
    pub async fn chat(
        &self,
        messages: &[Message],
        system: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, ProviderError> {
        let attempts: Vec<(&Arc<dyn LlmProvider>, GenerationOptions)> = self
            .providers
            .iter()
            .map(|p| (p, options.clone()))
            .collect();
        self.run(attempts, messages, system).await
    }

    /// Like [`chat`](Self::chat), but backends owning a preferred model go
    /// first, in preference order, each asked for that model. Remaining
    /// backends follow in configured order with their own primary model.
    /// A backend is attempted at most once, for its first preferred model.
    pub async fn chat_preferring(
        &self,
        preferred: &[ModelPreference],
        messages: &[Message],
        system: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, ProviderError> {
        self.run(self.plan(preferred, options), messages, system)
            .await
    }

    fn plan(
        &self,
        preferred: &[ModelPreference],
        options: &GenerationOptions,
    ) -> Vec<(&Arc<dyn LlmProvider>, GenerationOptions)> {
        let mut attempts: Vec<(&Arc<dyn LlmProvider>, GenerationOptions)> =
            Vec::with_capacity(self.providers.len());

        for preference in preferred {
            let Some(provider) = self.providers.iter().find(|p| p.name() == preference.provider)
            else {
                debug!(
                    "No backend '{}' for preferred model {}, skipping",
                    preference.provider, preference.model_id
                );
                continue;
            };
            if attempts.iter().any(|(p, _)| Arc::ptr_eq(*p, provider)) {
                continue;
            }
            let mut attempt = options.clone();
            attempt.model = Some(preference.clone());
            attempts.push((provider, attempt));
        }

        for provider in &self.providers {
            if !attempts.iter().any(|(p, _)| Arc::ptr_eq(*p, provider)) {
                let mut attempt = options.clone();
                attempt.model = None;
                attempts.push((provider, attempt));
            }
        }
        attempts
    }

    async fn run(
        &self,
        attempts: Vec<(&Arc<dyn LlmProvider>, GenerationOptions)>,
        messages: &[Message],
        system: &str,
    ) -> Result<GenerationResult, ProviderError> {
        if attempts.is_empty() {
            return Err(ProviderError::NoProvidersAvailable);
        }

        let mut failed: Vec<String> = Vec::new();
        let mut last_error = None;

        for (provider, options) in attempts {
            match provider.chat(messages, system, &options).await {
                Ok(mut result) => {
                    if !failed.is_empty() {
                        let cross = format!(
                            "{} failed; served by {}",
                            failed.join(", "),
                            result.provider_name
                        );
                        info!("Cross-provider fallback: {}", cross);
                        result.fallback_reason = Some(match result.fallback_reason.take() {
                            Some(inner) => format!("{cross}; {inner}"),
                            None => cross,
                        });
                    }
                    return Ok(result);
                }
                Err(err) => {
                    warn!(
                        provider = provider.name(),
                        kind = err.kind(),
                        "Provider failed, trying next: {}",
                        err
                    );
                    self.events.emit(&RoutingEvent::ProviderFailed {
                        provider: provider.name().to_string(),
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                    });
                    failed.push(format!("{} ({})", provider.name(), err.kind()));
                    last_error = Some(err);
                }
            }
        }

        let Some(last) = last_error else {
            return Err(ProviderError::NoProvidersAvailable);
        };
        self.events.emit(&RoutingEvent::ProvidersExhausted {
            attempts: failed.len(),
            last_error: last.to_string(),
        });
        Err(ProviderError::AllProvidersFailed {
            attempts: failed.len(),
            last: Box::new(last),
        })
    }
}
