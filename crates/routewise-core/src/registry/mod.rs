//! Backend registry: static model catalog, route table and pricing
//!
//! Read-only after construction. Components receive it by `Arc` rather than
//! reaching for a process-wide instance, so tests can hand in their own.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::route::Route;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown model '{0}'")]
    UnknownModel(String),
}

/// Metadata for one model of one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Registry key (e.g. "claude-sonnet")
    pub key: String,
    /// Identifier the backend expects on the wire
    pub id: String,
    /// Backend name serving this model
    pub provider: String,
    /// USD per million input tokens
    pub input_price_per_mtok: f64,
    /// USD per million output tokens
    pub output_price_per_mtok: f64,
    pub context_window: u32,
    pub max_output_tokens: u32,
}

/// Per-route model choice and generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub primary_model: String,
    #[serde(default)]
    pub fallback_models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Passed through untouched; retrieval lives outside this crate
    #[serde(default)]
    pub rerank: bool,
}

/// Work that has a dedicated model assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Classification,
    Summarization,
}

/// The registry itself
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    models: BTreeMap<String, ModelInfo>,
    routes: [RouteConfig; 5],
    tasks: BTreeMap<TaskKind, String>,
}

fn model(
    key: &str,
    id: &str,
    provider: &str,
    input_price: f64,
    output_price: f64,
    context_window: u32,
    max_output_tokens: u32,
) -> ModelInfo {
    ModelInfo {
        key: key.to_string(),
        id: id.to_string(),
        provider: provider.to_string(),
        input_price_per_mtok: input_price,
        output_price_per_mtok: output_price,
        context_window,
        max_output_tokens,
    }
}

fn route(primary: &str, fallbacks: &[&str], temperature: f32, max_tokens: u32, rerank: bool) -> RouteConfig {
    RouteConfig {
        primary_model: primary.to_string(),
        fallback_models: fallbacks.iter().map(|s| s.to_string()).collect(),
        temperature,
        max_tokens,
        rerank,
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BackendRegistry {
    /// The built-in catalog
    pub fn builtin() -> Self {
        let models = [
            model("claude-haiku", "claude-3-5-haiku-latest", "anthropic", 0.80, 4.00, 200_000, 8_192),
            model("claude-sonnet", "claude-sonnet-4-20250514", "anthropic", 3.00, 15.00, 200_000, 64_000),
            model("claude-opus", "claude-opus-4-20250514", "anthropic", 15.00, 75.00, 200_000, 32_000),
            model("gpt-4o-mini", "gpt-4o-mini", "openai", 0.15, 0.60, 128_000, 16_384),
            model("gpt-4o", "gpt-4o", "openai", 2.50, 10.00, 128_000, 16_384),
            model("gemini-flash", "gemini-2.0-flash", "google", 0.10, 0.40, 1_048_576, 8_192),
            model("gemini-pro", "gemini-1.5-pro", "google", 1.25, 5.00, 2_097_152, 8_192),
            model("llama-8b", "llama-3.1-8b-instant", "groq", 0.05, 0.08, 131_072, 8_192),
            model("llama-70b", "llama-3.3-70b-versatile", "groq", 0.59, 0.79, 131_072, 32_768),
        ];

        // Indexed by Route::index(): fast, standard, deep, creative, research
        let routes = [
            route("gpt-4o-mini", &["gemini-flash", "claude-haiku", "llama-8b"], 0.3, 1024, false),
            route("claude-sonnet", &["gpt-4o", "gemini-pro", "llama-70b"], 0.5, 2048, false),
            route("claude-opus", &["gpt-4o", "gemini-pro"], 0.3, 4096, false),
            route("gpt-4o", &["claude-sonnet", "gemini-pro"], 0.9, 2048, false),
            route("gemini-pro", &["claude-sonnet", "gpt-4o"], 0.2, 4096, true),
        ];

        let mut tasks = BTreeMap::new();
        tasks.insert(TaskKind::Classification, "gpt-4o-mini".to_string());
        tasks.insert(TaskKind::Summarization, "gemini-flash".to_string());

        Self {
            models: models.into_iter().map(|m| (m.key.clone(), m)).collect(),
            routes,
            tasks,
        }
    }

    /// Add or replace a model entry
    pub fn with_model(mut self, info: ModelInfo) -> Self {
        self.models.insert(info.key.clone(), info);
        self
    }

    /// Replace one route's configuration
    pub fn with_route_config(mut self, route: Route, config: RouteConfig) -> Self {
        self.routes[route.index()] = config;
        self
    }

    /// Reassign a task's dedicated model
    pub fn with_task_model(mut self, task: TaskKind, model_key: impl Into<String>) -> Self {
        self.tasks.insert(task, model_key.into());
        self
    }

    pub fn route_config(&self, route: Route) -> &RouteConfig {
        &self.routes[route.index()]
    }

    /// Metadata of a route's primary model
    pub fn route_model(&self, route: Route) -> Result<&ModelInfo, RegistryError> {
        self.model(&self.route_config(route).primary_model)
    }

    pub fn model(&self, key: &str) -> Result<&ModelInfo, RegistryError> {
        self.models
            .get(key)
            .ok_or_else(|| RegistryError::UnknownModel(key.to_string()))
    }

    pub fn model_id(&self, key: &str) -> Result<&str, RegistryError> {
        self.model(key).map(|m| m.id.as_str())
    }

    /// Look a model up by registry key first, then by wire id
    pub fn find_model(&self, key_or_id: &str) -> Option<&ModelInfo> {
        self.models
            .get(key_or_id)
            .or_else(|| self.models.values().find(|m| m.id == key_or_id))
    }

    pub fn task_model(&self, task: TaskKind) -> Option<&ModelInfo> {
        self.tasks.get(&task).and_then(|key| self.models.get(key))
    }

    /// All models, ordered by key
    pub fn models(&self) -> impl Iterator<Item = &ModelInfo> {
        self.models.values()
    }

    /// Estimated USD cost of a call. Linear in both token counts.
    pub fn estimate_cost(
        &self,
        key_or_id: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<f64, RegistryError> {
        let info = self
            .find_model(key_or_id)
            .ok_or_else(|| RegistryError::UnknownModel(key_or_id.to_string()))?;
        Ok(price(
            input_tokens,
            output_tokens,
            info.input_price_per_mtok,
            info.output_price_per_mtok,
        ))
    }
}

/// Cost of a call at the given per-million-token prices
pub fn price(input_tokens: u64, output_tokens: u64, input_per_mtok: f64, output_per_mtok: f64) -> f64 {
    (input_tokens as f64 * input_per_mtok + output_tokens as f64 * output_per_mtok) / 1_000_000.0
}
