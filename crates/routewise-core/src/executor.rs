//! Route executor
//!
//! Turns a route plus conversation context into one manager call and a
//! uniform [`ExecutionResult`] with timing and cost accounting. Failures from
//! the manager are returned untouched; there is no extra fallback here.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::providers::{
    GenerationOptions, GenerationResult, Message, ModelPreference, ProviderError, ProviderManager,
};
use crate::registry::{BackendRegistry, price};
use crate::route::Route;
use crate::router::{QueryMode, RouterDecision};

const FAST_PROMPT: &str = "You are a concise assistant. Answer directly in one to three sentences. \
Skip preamble and caveats unless they change the answer.";

const STANDARD_PROMPT: &str = "You are a helpful, knowledgeable assistant. Give a clear, well-organized \
answer with enough detail to be useful. Use short paragraphs or lists where they help.";

const DEEP_PROMPT: &str = "You are an expert analyst. Reason through the problem step by step before \
concluding. Compare alternatives explicitly, state trade-offs and assumptions, and finish with a \
clear recommendation.";

const CREATIVE_PROMPT: &str = "You are a creative writer. Favor vivid, original language and an \
engaging voice. Take imaginative liberties unless the request sets constraints.";

const RESEARCH_PROMPT: &str = "You are a careful research assistant. Ground every claim in the provided \
context when it is available, say which part of the context supports it, and flag anything the \
context does not cover. Do not invent sources.";

/// Built-in system prompt for a route
pub fn default_system_prompt(route: Route) -> &'static str {
    match route {
        Route::Fast => FAST_PROMPT,
        Route::Standard => STANDARD_PROMPT,
        Route::Deep => DEEP_PROMPT,
        Route::Creative => CREATIVE_PROMPT,
        Route::Research => RESEARCH_PROMPT,
    }
}

/// Everything the executor needs to answer one query
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub query: String,
    /// Prior turns, oldest first
    pub history: Vec<Message>,
    /// Pre-retrieved context, opaque to this crate
    pub retrieved_context: Option<String>,
    /// Replaces the route's default system prompt
    pub system_prompt: Option<String>,
    pub mode: QueryMode,
    /// Decision that chose the route, when routing ran
    pub decision: Option<RouterDecision>,
}

impl ExecutionContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_retrieved_context(mut self, context: impl Into<String>) -> Self {
        self.retrieved_context = Some(context.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Retrieved context, unless missing or blank
    pub fn context_text(&self) -> Option<&str> {
        self.retrieved_context
            .as_deref()
            .filter(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Timing {
    pub total_ms: u64,
    /// Present only when a routing decision preceded execution
    pub routing_ms: Option<u64>,
    pub generation_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Costs {
    pub estimated_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub request_id: Uuid,
    pub answer: String,
    pub route: Route,
    /// Model that actually produced `answer`
    pub model_id: String,
    /// Backend that actually produced `answer`
    pub provider_name: String,
    pub confidence: f64,
    pub timing: Timing,
    pub costs: Costs,
    pub fallback_used: bool,
    pub fallback_reason: Option<String>,
    pub truncated: bool,
    /// Reranking flag from the route configuration, passed through
    pub rerank: bool,
}

pub struct RouteExecutor {
    manager: Arc<ProviderManager>,
    registry: Arc<BackendRegistry>,
    config: ExecutorConfig,
}

impl RouteExecutor {
    pub fn new(manager: Arc<ProviderManager>, registry: Arc<BackendRegistry>, config: ExecutorConfig) -> Self {
        Self {
            manager,
            registry,
            config,
        }
    }

    pub fn manager(&self) -> &ProviderManager {
        &self.manager
    }

    pub async fn execute(
        &self,
        route: Route,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ProviderError> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let route_config = self.registry.route_config(route);

        let messages = build_messages(ctx);
        let system = ctx
            .system_prompt
            .as_deref()
            .unwrap_or_else(|| default_system_prompt(route));

        let options = GenerationOptions {
            json_mode: None,
            max_tokens: Some(route_config.max_tokens),
            temperature: Some(route_config.temperature),
            model: None,
        };
        let preferred = self.route_models(route);

        debug!(
            %request_id,
            route = %route,
            messages = messages.len(),
            "Executing route"
        );

        let generation_started = Instant::now();
        let result = self
            .manager
            .chat_preferring(&preferred, &messages, system, &options)
            .await?;
        let generation_ms = generation_started.elapsed().as_millis() as u64;

        let (input_tokens, output_tokens) = token_counts(&result, system, &messages);
        let estimated_usd = self.estimate_cost(&result.model_id, input_tokens, output_tokens);

        let routing_ms = ctx.decision.as_ref().map(|d| d.latency_ms);
        let confidence = ctx
            .decision
            .as_ref()
            .map(|d| d.confidence)
            .unwrap_or(self.config.default_confidence);
        let total_ms = started.elapsed().as_millis() as u64 + routing_ms.unwrap_or(0);

        info!(
            %request_id,
            route = %route,
            provider = %result.provider_name,
            model = %result.model_id,
            input_tokens,
            output_tokens,
            cost_usd = estimated_usd,
            total_ms,
            "Route executed"
        );

        let fallback_used = result.fallback_used();
        Ok(ExecutionResult {
            request_id,
            answer: result.content,
            route,
            model_id: result.model_id,
            provider_name: result.provider_name,
            confidence,
            timing: Timing {
                total_ms,
                routing_ms,
                generation_ms,
            },
            costs: Costs {
                estimated_usd,
                input_tokens,
                output_tokens,
            },
            fallback_used,
            fallback_reason: result.fallback_reason,
            truncated: result.truncated,
            rerank: route_config.rerank,
        })
    }

    /// The route's primary model followed by its fallbacks, as wire ids
    pub fn route_models(&self, route: Route) -> Vec<ModelPreference> {
        let route_config = self.registry.route_config(route);
        std::iter::once(&route_config.primary_model)
            .chain(route_config.fallback_models.iter())
            .filter_map(|key| match self.registry.model(key) {
                Ok(m) => Some(ModelPreference {
                    provider: m.provider.clone(),
                    model_id: m.id.clone(),
                }),
                Err(e) => {
                    warn!(route = %route, "Skipping route model: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Registry price for the returned model, or the configured default pair
    fn estimate_cost(&self, model_id: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.registry
            .estimate_cost(model_id, input_tokens, output_tokens)
            .unwrap_or_else(|e| {
                debug!("{}; using default pricing", e);
                price(
                    input_tokens,
                    output_tokens,
                    self.config.default_input_price_per_mtok,
                    self.config.default_output_price_per_mtok,
                )
            })
    }
}

/// Prior turns followed by one new user turn
pub fn build_messages(ctx: &ExecutionContext) -> Vec<Message> {
    let mut messages = Vec::with_capacity(ctx.history.len() + 1);
    messages.extend(ctx.history.iter().cloned());

    let content = match ctx.context_text() {
        Some(context) => format!("Context:\n{}\n\nQuestion: {}", context, ctx.query),
        None => ctx.query.clone(),
    };
    messages.push(Message::user(content));
    messages
}

/// Rough token count: a quarter of the character count, rounded up
pub fn approximate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

fn token_counts(result: &GenerationResult, system: &str, messages: &[Message]) -> (u64, u64) {
    match result.usage {
        Some(usage) => (usage.input_tokens as u64, usage.output_tokens as u64),
        None => {
            let submitted = approximate_tokens(system)
                + messages.iter().map(|m| approximate_tokens(&m.content)).sum::<u64>();
            (submitted, approximate_tokens(&result.content))
        }
    }
}
